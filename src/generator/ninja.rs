//! Ninja build script generation
//!
//! Emits one build.ninja under the working directory covering component
//! libraries, generated per-exe mains, executable links and staging of
//! bundled files.  The script is declarative only; running ninja is the
//! caller's business.

use std::fmt::Write as _;

use itertools::Itertools;
use walkdir::WalkDir;

use crate::buildparams::BuildParams;
use crate::envvars;
use crate::model::{App, Component, Exe, Model, System};
use crate::system::{self, path, Error};

/// Compiler command for the target, from <TARGET>_TOOLCHAIN_DIR /
/// <TARGET>_TOOLCHAIN_PREFIX, defaulting to the host compiler.
fn compiler_path(build_params: &BuildParams, compiler: &str) -> String {
    let target = build_params.target.to_uppercase();
    let dir = envvars::get(&format!("{}_TOOLCHAIN_DIR", target));
    let prefix = envvars::get(&format!("{}_TOOLCHAIN_PREFIX", target));
    if dir.is_empty() && prefix.is_empty() {
        return compiler.to_string();
    }
    if dir.is_empty() {
        format!("{}{}", prefix, compiler)
    } else {
        path::combine(&dir, &format!("{}{}", prefix, compiler))
    }
}

fn use_clang() -> bool {
    envvars::get("USE_CLANG") == "1"
}

fn generate_header(out: &mut String, build_params: &BuildParams) {
    out.push_str("# Generated build script. Do not edit.\n\n");
    let _ = writeln!(out, "builddir = {}", build_params.working_dir);

    let (cc, cxx) = if use_clang() {
        ("clang".to_string(), "clang++".to_string())
    } else {
        (
            compiler_path(build_params, "gcc"),
            compiler_path(build_params, "g++"),
        )
    };
    let _ = writeln!(out, "cc = {}", cc);
    let _ = writeln!(out, "cxx = {}", cxx);

    let sysroot = envvars::get("LEGATO_SYSROOT");
    if !sysroot.is_empty() {
        let _ = writeln!(out, "sysrootFlag = --sysroot={}", sysroot);
    } else {
        out.push_str("sysrootFlag =\n");
    }
    out.push('\n');

    out.push_str(
        "rule cc\n\
         \x20 description = Compiling C source\n\
         \x20 depfile = $out.d\n\
         \x20 deps = gcc\n\
         \x20 command = $cc $sysrootFlag -MMD -MF $out.d $cFlags -fPIC -c $in -o $out\n\
         \n\
         rule cxx\n\
         \x20 description = Compiling C++ source\n\
         \x20 depfile = $out.d\n\
         \x20 deps = gcc\n\
         \x20 command = $cxx $sysrootFlag -MMD -MF $out.d $cxxFlags -fPIC -c $in -o $out\n\
         \n\
         rule linkso\n\
         \x20 description = Linking component library\n\
         \x20 command = $cc $sysrootFlag -shared -o $out $in $ldFlags\n\
         \n\
         rule linkexe\n\
         \x20 description = Linking executable\n\
         \x20 command = $cc $sysrootFlag -o $out $in $ldFlags\n\
         \n\
         rule stage\n\
         \x20 description = Staging file\n\
         \x20 command = mkdir -p $$(dirname $out) && cp -rf $in $out\n\
         \n",
    );
}

/// Object file path for one source file of a component.
fn object_file_path(component: &Component, source: &str) -> String {
    format!(
        "$builddir/{}/obj/{}.o",
        component.working_dir,
        path::get_last_node(source)
    )
}

fn generate_component_build(out: &mut String, model: &Model, component: &Component) {
    if !component.has_c_or_cpp_code() {
        return;
    }

    let _ = writeln!(out, "# Component '{}'", component.name);

    // Headers generated for the APIs this component uses.
    let include_flags = format!(
        "-I$builddir/{}/src -I$builddir/api",
        component.working_dir
    );
    let c_flags = component
        .cflags
        .iter()
        .map(|s| s.as_str())
        .chain([include_flags.as_str()])
        .join(" ");
    let cxx_flags = component
        .cxxflags
        .iter()
        .map(|s| s.as_str())
        .chain([include_flags.as_str()])
        .join(" ");

    let mut objects = Vec::new();

    for source in &component.c_sources {
        let object = object_file_path(component, source);
        let _ = writeln!(out, "build {}: cc {}", object, source);
        let _ = writeln!(out, "  cFlags = {}", c_flags);
        objects.push(object);
    }
    for source in &component.cxx_sources {
        let object = object_file_path(component, source);
        let _ = writeln!(out, "build {}: cxx {}", object, source);
        let _ = writeln!(out, "  cxxFlags = {}", cxx_flags);
        objects.push(object);
    }

    // The generated _componentMain.c for this component.
    let component_main = format!("$builddir/{}/src/_componentMain.c", component.working_dir);
    let component_main_obj = format!("$builddir/{}/obj/_componentMain.c.o", component.working_dir);
    let _ = writeln!(out, "build {}: cc {}", component_main_obj, component_main);
    let _ = writeln!(out, "  cFlags = {}", c_flags);
    objects.push(component_main_obj);

    // IPC client/server stubs for the APIs used.
    for interface in &component.client_apis {
        let api = model.api_file(interface.api_file);
        let source = format!("$builddir/{}", api.client_source_file(&interface.internal_name));
        let object = format!("{}.o", source);
        let _ = writeln!(out, "build {}: cc {}", object, source);
        let _ = writeln!(out, "  cFlags = {}", c_flags);
        objects.push(object);
    }
    for interface in &component.server_apis {
        let api = model.api_file(interface.api_file);
        let source = format!(
            "$builddir/{}",
            api.server_source_file(&interface.internal_name, interface.is_async)
        );
        let object = format!("{}.o", source);
        let _ = writeln!(out, "build {}: cc {}", object, source);
        let _ = writeln!(out, "  cFlags = {}", c_flags);
        objects.push(object);
    }

    let _ = writeln!(
        out,
        "build $builddir/{}: linkso {}",
        component.lib,
        objects.iter().join(" ")
    );
    let _ = writeln!(out, "  ldFlags = {}", component.ldflags.iter().join(" "));
    out.push('\n');
}

fn generate_exe_build(out: &mut String, model: &Model, exe: &Exe, app: Option<&App>) {
    if !exe.has_c_or_cpp_code {
        return;
    }

    let _ = writeln!(out, "# Executable '{}'", exe.name);

    let main_source = format!("$builddir/{}", exe.main_source_file());
    let main_object = format!("$builddir/{}", exe.main_object_file());
    let _ = writeln!(out, "build {}: cc {}", main_object, main_source);
    out.push_str("  cFlags =\n");

    let mut inputs = vec![main_object];
    let mut ld_flags = Vec::new();
    for instance in &exe.component_instances {
        let component = model.component(instance.component);
        if !component.lib.is_empty() {
            inputs.push(format!("$builddir/{}", component.lib));
        }
        ld_flags.extend(component.ldflags.iter().cloned());
    }

    let exe_output = match app {
        Some(app) => format!("$builddir/{}/{}", app.working_dir, exe.path),
        None => exe.path.clone(),
    };
    let _ = writeln!(out, "build {}: linkexe {}", exe_output, inputs.iter().join(" "));
    let _ = writeln!(out, "  ldFlags = {}", ld_flags.iter().join(" "));
    out.push('\n');
}

/// Stage every bundled file of an app (and its components) into the app's
/// staging tree.  Bundled directories are walked so each contained file
/// gets its own edge and incremental staging stays accurate.
fn generate_staging(out: &mut String, model: &Model, app: &App) {
    let staging = format!("$builddir/{}/staging", app.working_dir);

    let mut stage_one = |src: &str, dest: &str| {
        let dest_path = format!("{}/read-only{}", staging, dest);
        let _ = writeln!(out, "build {}: stage {}", dest_path, src);
    };

    for &component_id in &app.components {
        let component = model.component(component_id);
        for bundled in &component.bundled_files {
            stage_one(&bundled.src_path, &bundled.dest_path);
        }
        for bundled in &component.bundled_dirs {
            for entry in WalkDir::new(&bundled.src_path)
                .sort_by_file_name()
                .into_iter()
                .flatten()
                .filter(|e| e.file_type().is_file())
            {
                let src = entry.path().display().to_string();
                let relative = src
                    .strip_prefix(&bundled.src_path)
                    .unwrap_or_default()
                    .to_string();
                stage_one(&src, &format!("{}{}", bundled.dest_path, relative));
            }
        }
    }
    for bundled in &app.bundled_files {
        stage_one(&bundled.src_path, &bundled.dest_path);
    }
    for bundled in &app.bundled_dirs {
        for entry in WalkDir::new(&bundled.src_path)
            .sort_by_file_name()
            .into_iter()
            .flatten()
            .filter(|e| e.file_type().is_file())
        {
            let src = entry.path().display().to_string();
            let relative = src
                .strip_prefix(&bundled.src_path)
                .unwrap_or_default()
                .to_string();
            stage_one(&src, &format!("{}{}", bundled.dest_path, relative));
        }
    }

    out.push('\n');
}

fn generate_app_builds(out: &mut String, model: &Model, app: &App) {
    for &component_id in &app.components {
        generate_component_build(out, model, model.component(component_id));
    }
    for exe in app.executables.values() {
        generate_exe_build(out, model, exe, Some(app));
    }
    generate_staging(out, model, app);
}

/// Write the build.ninja for a single-app build (mkapp).
pub fn generate_for_app(model: &Model, app: &App, build_params: &BuildParams) -> Result<(), Error> {
    let mut out = String::new();
    generate_header(&mut out, build_params);
    generate_app_builds(&mut out, model, app);
    write_script(out, build_params)
}

/// Write the build.ninja for a whole system (mksys).
pub fn generate_for_system(
    model: &Model,
    sys: &System,
    build_params: &BuildParams,
) -> Result<(), Error> {
    let mut out = String::new();
    generate_header(&mut out, build_params);
    for app in sys.apps.values() {
        generate_app_builds(&mut out, model, app);
    }
    write_script(out, build_params)
}

/// Write the build.ninja for a free-standing exe build (mkexe).
pub fn generate_for_exe(model: &Model, exe: &Exe, build_params: &BuildParams) -> Result<(), Error> {
    let mut out = String::new();
    generate_header(&mut out, build_params);
    for instance in &exe.component_instances {
        generate_component_build(&mut out, model, model.component(instance.component));
    }
    generate_exe_build(&mut out, model, exe, None);
    write_script(out, build_params)
}

fn write_script(content: String, build_params: &BuildParams) -> Result<(), Error> {
    system::ensure_directory(&build_params.working_dir)?;
    let script_path = path::combine(&build_params.working_dir, "build.ninja");
    if build_params.be_verbose {
        system::verboseln!("Generating", "ninja build script '{}'.", script_path);
    }
    system::write_file(&script_path, content)
}
