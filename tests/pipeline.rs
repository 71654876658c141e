//! End-to-end pipeline tests: definition files in, generated artifacts out.

use std::fs;
use std::path::Path;

use mktools::buildparams::BuildParams;
use mktools::generator;
use mktools::model::Model;
use mktools::modeller;

/// Lay out a minimal project: one app with one exe built from one
/// component.  Returns (project dir, adef path, build params).
struct Fixture {
    _project: tempfile::TempDir,
    work: tempfile::TempDir,
    adef_path: String,
    sdef_path: String,
    build_params: BuildParams,
}

fn fixture(cdef_content: &str, adef_content: &str) -> Fixture {
    let project = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let comp_dir = project.path().join("comps/myComp");
    fs::create_dir_all(&comp_dir).unwrap();
    fs::write(comp_dir.join("Component.cdef"), cdef_content).unwrap();
    fs::write(comp_dir.join("foo.c"), "/* empty */\n").unwrap();

    let interfaces = project.path().join("interfaces");
    fs::create_dir_all(&interfaces).unwrap();
    for api in ["le_cfg", "le_wdog", "le_info", "le_opt"] {
        fs::write(
            interfaces.join(format!("{}.api", api)),
            "FUNCTION Get();\n",
        )
        .unwrap();
    }

    let adef_path = project.path().join("myApp.adef");
    fs::write(&adef_path, adef_content).unwrap();

    let sdef_path = project.path().join("mySystem.sdef");
    fs::write(&sdef_path, "apps:\n{\n    myApp\n}\n").unwrap();

    let build_params = BuildParams {
        target: "localhost".to_string(),
        working_dir: work.path().display().to_string(),
        lib_output_dir: "lib".to_string(),
        source_dirs: vec![project.path().display().to_string()],
        interface_dirs: vec![interfaces.display().to_string()],
        ..Default::default()
    };

    Fixture {
        adef_path: adef_path.display().to_string(),
        sdef_path: sdef_path.display().to_string(),
        _project: project,
        work,
        build_params,
    }
}

fn read_workdir_file(fixture: &Fixture, relative: &str) -> String {
    fs::read_to_string(fixture.work.path().join(relative)).unwrap()
}

fn workdir_file_exists(fixture: &Fixture, relative: &str) -> bool {
    fixture.work.path().join(relative).is_file()
}

const MINIMAL_CDEF: &str = "sources:\n{\n    foo.c\n}\n";

const MINIMAL_ADEF: &str = "executables:\n{\n    myExe = ( comps/myComp )\n}\n\n\
                            processes:\n{\n    run:\n    {\n        ( myExe )\n    }\n}\n";

fn build_app(fixture: &Fixture) -> (Model, mktools::model::App) {
    let mut model = Model::new();
    let mut app = modeller::get_app(&mut model, &fixture.adef_path, &fixture.build_params).unwrap();
    modeller::ensure_client_interfaces_satisfied(&model, &mut app).unwrap();
    generator::generate_app(&model, &app, &fixture.build_params).unwrap();
    (model, app)
}

#[test]
fn minimal_app_produces_expected_artifacts() {
    let fixture = fixture(MINIMAL_CDEF, MINIMAL_ADEF);
    let (_, app) = build_app(&fixture);

    // Defaults from the data model.
    assert!(app.is_sandboxed);
    assert_eq!(app.max_memory_bytes.get(), 40_960_000);

    let root_cfg = read_workdir_file(&fixture, "app/myApp/staging/root.cfg");
    assert!(root_cfg.contains("\"maxMemoryBytes\" [40960000]"), "{}", root_cfg);
    // Sandboxed is the default, so no "sandboxed" override appears.
    assert!(!root_cfg.contains("\"sandboxed\""), "{}", root_cfg);
    assert!(root_cfg.contains("\"myExe\""), "{}", root_cfg);

    assert!(workdir_file_exists(&fixture, "manifest.app"));

    let component_main = read_workdir_file(&fixture, "component/myComp/src/_componentMain.c");
    assert!(
        component_main.contains("void _myComp_COMPONENT_INIT(void);"),
        "{}",
        component_main
    );
}

#[test]
fn unbound_le_cfg_interface_is_auto_bound_to_root() {
    let fixture = fixture(
        "sources:\n{\n    foo.c\n}\n\nrequires:\n{\n    api:\n    {\n        \
         le_cfg = le_cfg.api\n    }\n}\n",
        MINIMAL_ADEF,
    );
    let (_, app) = build_app(&fixture);

    let bindings = app.bindings();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].server_agent, "root");
    assert_eq!(bindings[0].server_if, "le_cfg");

    let root_cfg = read_workdir_file(&fixture, "app/myApp/staging/root.cfg");
    assert!(root_cfg.contains("\"myExe.myComp.le_cfg\""), "{}", root_cfg);
    assert!(root_cfg.contains("\"user\" \"root\""), "{}", root_cfg);
    assert!(root_cfg.contains("\"interface\" \"le_cfg\""), "{}", root_cfg);
}

#[test]
fn start_priority_is_clamped_to_max_priority() {
    let fixture = fixture(
        MINIMAL_CDEF,
        "executables:\n{\n    myExe = ( comps/myComp )\n}\n\n\
         processes:\n{\n    run:\n    {\n        ( myExe )\n    }\n\n    \
         maxPriority: medium\n    priority: high\n}\n",
    );
    let (_, app) = build_app(&fixture);

    let proc_env = &app.process_envs[0];
    assert_eq!(proc_env.start_priority().get(), "medium");

    let root_cfg = read_workdir_file(&fixture, "app/myApp/staging/root.cfg");
    assert!(root_cfg.contains("\"priority\" \"medium\""), "{}", root_cfg);
}

#[test]
fn duplicate_external_interface_name_is_fatal() {
    let fixture = fixture(
        "sources:\n{\n    foo.c\n}\n\nrequires:\n{\n    api:\n    {\n        \
         cfg = le_cfg.api\n        info = le_info.api\n    }\n}\n",
        "executables:\n{\n    myExe = ( comps/myComp )\n}\n\n\
         processes:\n{\n    run:\n    {\n        ( myExe )\n    }\n}\n\n\
         extern:\n{\n    foo = myExe.myComp.cfg\n    foo = myExe.myComp.info\n}\n",
    );

    let mut model = Model::new();
    let err = modeller::get_app(&mut model, &fixture.adef_path, &fixture.build_params).unwrap_err();
    assert!(
        err.to_string().contains("Duplicate external interface name: 'foo'"),
        "{}",
        err
    );
}

#[test]
fn unbound_non_optional_interface_is_fatal() {
    let fixture = fixture(
        "sources:\n{\n    foo.c\n}\n\nrequires:\n{\n    api:\n    {\n        \
         info = le_info.api\n    }\n}\n",
        MINIMAL_ADEF,
    );

    let mut model = Model::new();
    let mut app =
        modeller::get_app(&mut model, &fixture.adef_path, &fixture.build_params).unwrap();
    let err = modeller::ensure_client_interfaces_satisfied(&model, &mut app).unwrap_err();
    assert!(err.to_string().contains("unsatisfied"), "{}", err);
}

#[test]
fn optional_interface_may_stay_unbound_and_gets_a_null_symbol() {
    let fixture = fixture(
        "sources:\n{\n    foo.c\n}\n\nrequires:\n{\n    api:\n    {\n        \
         opt = le_opt.api [optional]\n    }\n}\n",
        MINIMAL_ADEF,
    );

    let mut build_params = fixture.build_params.clone();
    let mut model = Model::new();
    let sys = modeller::get_system(&mut model, &fixture.sdef_path, &mut build_params).unwrap();

    // The optional interface stayed unbound.
    let app = &sys.apps["myApp"];
    let exe = &app.executables["myExe"];
    assert!(exe.component_instances[0].client_apis[0].binding.is_none());

    generator::rtos::generate_linker_script(&model, &sys, &build_params).unwrap();
    let linker_script = read_workdir_file(&fixture, "src/legato.ld");
    assert!(
        linker_script.contains("PROVIDE(_ipc_myExe_myComp_opt = 0);"),
        "{}",
        linker_script
    );
}

#[test]
fn system_build_is_byte_reproducible() {
    let fixture = fixture(
        "sources:\n{\n    foo.c\n}\n\nrequires:\n{\n    api:\n    {\n        \
         le_cfg = le_cfg.api\n    }\n}\n",
        MINIMAL_ADEF,
    );

    let mut build_params = fixture.build_params.clone();
    let mut model = Model::new();
    let sys = modeller::get_system(&mut model, &fixture.sdef_path, &mut build_params).unwrap();
    generator::generate_system(&model, &sys, &build_params).unwrap();
    let first = read_workdir_file(&fixture, "app/myApp/staging/root.cfg");
    let first_ninja = read_workdir_file(&fixture, "build.ninja");

    generator::generate_system(&model, &sys, &build_params).unwrap();
    let second = read_workdir_file(&fixture, "app/myApp/staging/root.cfg");
    let second_ninja = read_workdir_file(&fixture, "build.ninja");

    assert_eq!(first, second);
    assert_eq!(first_ninja, second_ninja);
}

#[test]
fn exe_without_source_code_is_rejected() {
    let fixture = fixture(
        // A component with no sources at all.
        "bundles:\n{\n}\n",
        MINIMAL_ADEF,
    );

    let mut model = Model::new();
    let err = modeller::get_app(&mut model, &fixture.adef_path, &fixture.build_params).unwrap_err();
    assert!(
        err.to_string()
            .contains("doesn't contain any components that have source code files"),
        "{}",
        err
    );
}

#[test]
fn process_name_length_boundary() {
    use mktools::model::Process;
    use mktools::system::Location;

    let mut process = Process::new(Location::new("test.adef", 1, 0));
    let at_limit = "p".repeat(47);
    process.set_name(&at_limit).unwrap();
    assert_eq!(process.name(), at_limit);

    let over_limit = "p".repeat(48);
    assert!(process.set_name(&over_limit).is_err());
}

#[test]
fn sdef_overrides_apply_after_the_adef() {
    let fixture = fixture(MINIMAL_CDEF, MINIMAL_ADEF);

    // Rewrite the .sdef to override limits for the app.
    fs::write(
        Path::new(&fixture.sdef_path),
        "apps:\n{\n    myApp\n    {\n        maxThreads: 4\n        sandboxed: false\n    }\n}\n",
    )
    .unwrap();

    let mut build_params = fixture.build_params.clone();
    let mut model = Model::new();
    let sys = modeller::get_system(&mut model, &fixture.sdef_path, &mut build_params).unwrap();

    let app = &sys.apps["myApp"];
    assert_eq!(app.max_threads.get(), 4);
    assert!(!app.is_sandboxed);

    generator::generate_app(&model, app, &build_params).unwrap();
    let root_cfg = read_workdir_file(&fixture, "app/myApp/staging/root.cfg");
    assert!(root_cfg.contains("\"sandboxed\" !f"), "{}", root_cfg);
    assert!(root_cfg.contains("\"maxThreads\" [4]"), "{}", root_cfg);
}

#[test]
fn exported_adef_skips_defaults_and_keeps_composition() {
    let fixture = fixture(MINIMAL_CDEF, MINIMAL_ADEF);
    build_app(&fixture);

    let exported = read_workdir_file(&fixture, "myApp.adef");
    assert!(exported.contains("start: auto"), "{}", exported);
    assert!(exported.contains("sandboxed: true"), "{}", exported);
    // Unset limits are skipped entirely.
    assert!(!exported.contains("maxMemoryBytes"), "{}", exported);
    assert!(exported.contains("myExe = ("), "{}", exported);
    // No interfaces are exported, so no extern block appears.
    assert!(!exported.contains("extern:"), "{}", exported);
}

#[test]
fn component_instances_are_topologically_sorted() {
    let project = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    // parent requires child; the child must be instantiated first.
    let child_dir = project.path().join("child");
    fs::create_dir_all(&child_dir).unwrap();
    fs::write(child_dir.join("Component.cdef"), "sources:\n{\n    c.c\n}\n").unwrap();
    fs::write(child_dir.join("c.c"), "").unwrap();

    let parent_dir = project.path().join("parent");
    fs::create_dir_all(&parent_dir).unwrap();
    fs::write(
        parent_dir.join("Component.cdef"),
        "sources:\n{\n    p.c\n}\n\nrequires:\n{\n    component:\n    {\n        ../child\n    }\n}\n",
    )
    .unwrap();
    fs::write(parent_dir.join("p.c"), "").unwrap();

    let adef_path = project.path().join("app.adef");
    fs::write(
        &adef_path,
        "executables:\n{\n    exe = ( parent )\n}\n\n\
         processes:\n{\n    run:\n    {\n        ( exe )\n    }\n}\n",
    )
    .unwrap();

    let build_params = BuildParams {
        working_dir: work.path().display().to_string(),
        source_dirs: vec![project.path().display().to_string()],
        ..Default::default()
    };

    let mut model = Model::new();
    let app = modeller::get_app(
        &mut model,
        &adef_path.display().to_string(),
        &build_params,
    )
    .unwrap();

    let exe = &app.executables["exe"];
    let names: Vec<&str> = exe
        .component_instances
        .iter()
        .map(|i| model.component(i.component).name.as_str())
        .collect();
    assert_eq!(names, vec!["child", "parent"]);
}
