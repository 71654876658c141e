use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod buildparams;
pub mod edit;
pub mod envvars;
pub mod generator;
pub mod lexer;
pub mod model;
pub mod modeller;
pub mod parse_tree;
pub mod parser;
pub mod system;

use buildparams::BuildParams;
use system::Error;

/// CLI entry point
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct MkTool {
    #[clap(subcommand)]
    pub command: MkCommand,
}

/// Build options shared by the build personalities.
#[derive(Debug, Clone, Default, Args)]
pub struct BuildOptions {
    /// Target device (e.g. localhost or wp85)
    #[clap(short, long, default_value = "localhost")]
    pub target: String,

    /// Build working directory
    #[clap(short, long, default_value = "_build")]
    pub work_dir: String,

    /// Directory to search for source files and definition files
    #[clap(short = 's', long = "source-dir")]
    pub source_dirs: Vec<String>,

    /// Directory to search for .api files
    #[clap(short = 'i', long = "interface-dir")]
    pub interface_dirs: Vec<String>,

    /// Generate code and configuration only; skip the ninja script
    #[clap(short = 'g', long)]
    pub code_gen_only: bool,

    /// Print verbose progress messages
    #[clap(short, long)]
    pub verbose: bool,
}

impl BuildOptions {
    /// Turn the command line options into build parameters, setting the
    /// target-specific environment variables as a side effect.
    pub fn to_build_params(&self) -> Result<BuildParams, Error> {
        envvars::set_target_specific(&self.target)?;

        let mut build_params = BuildParams::new();
        build_params.be_verbose = self.verbose;
        build_params.target = self.target.clone();
        build_params.working_dir = self.work_dir.clone();
        build_params.lib_output_dir = "lib".to_string();
        build_params.code_gen_only = self.code_gen_only;

        build_params.source_dirs.push(".".to_string());
        build_params.source_dirs.extend(self.source_dirs.iter().cloned());
        build_params
            .interface_dirs
            .extend(self.interface_dirs.iter().cloned());

        Ok(build_params)
    }
}

/// Build a whole system of applications from a .sdef file.
#[derive(Debug, Args)]
pub struct MkSys {
    /// Path of the .sdef file
    pub sdef: String,

    #[clap(flatten)]
    pub options: BuildOptions,
}

/// Build a single application from a .adef file.
#[derive(Debug, Args)]
pub struct MkApp {
    /// Path of the .adef file
    pub adef: String,

    #[clap(flatten)]
    pub options: BuildOptions,
}

/// Build a single executable from a list of components.
#[derive(Debug, Args)]
pub struct MkExe {
    /// Output path of the executable
    pub exe_path: String,

    /// Component to build into the executable (repeatable)
    #[clap(short = 'c', long = "component", required = true)]
    pub components: Vec<String>,

    #[clap(flatten)]
    pub options: BuildOptions,
}

/// Build a single component stand-alone.
#[derive(Debug, Args)]
pub struct MkComp {
    /// Directory containing the component's Component.cdef
    pub component_dir: String,

    #[clap(flatten)]
    pub options: BuildOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditActionArg {
    Add,
    Remove,
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditKindArg {
    App,
    Module,
    Component,
}

/// Structurally edit definition files in place.
#[derive(Debug, Args)]
pub struct MkEdit {
    #[clap(value_enum)]
    pub action: EditActionArg,

    #[clap(value_enum)]
    pub kind: EditKindArg,

    /// Name of the item to edit
    pub name: String,

    /// New name (rename only)
    pub new_name: Option<String>,

    /// The .sdef to edit (app and module edits)
    #[clap(long)]
    pub sdef: Option<String>,

    /// The .adef to edit (component edits)
    #[clap(long)]
    pub adef: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum MkCommand {
    /// Build a system from a .sdef
    Sys(MkSys),
    /// Build an app from a .adef
    App(MkApp),
    /// Build an executable from components
    Exe(MkExe),
    /// Build a component stand-alone
    Comp(MkComp),
    /// Edit a definition file
    Edit(MkEdit),
}

impl MkCommand {
    pub fn run(&self) -> Result<(), Error> {
        match self {
            MkCommand::Sys(args) => run_sys(args),
            MkCommand::App(args) => run_app(args),
            MkCommand::Exe(args) => run_exe(args),
            MkCommand::Comp(args) => run_comp(args),
            MkCommand::Edit(args) => run_edit(args),
        }
    }
}

fn run_sys(args: &MkSys) -> Result<(), Error> {
    let mut build_params = args.options.to_build_params()?;
    envvars::matches_saved(&build_params);

    let mut model = model::Model::new();
    let sys = modeller::get_system(&mut model, &args.sdef, &mut build_params)?;

    for app in sys.apps.values() {
        modeller::check_for_limits_conflicts(app);
    }

    generator::generate_system(&model, &sys, &build_params)?;

    // Only a successful run updates the snapshot; a failed one leaves the
    // next run to redo the work.
    envvars::save(&build_params)?;

    system::infoln!("Built", "system '{}'", sys.name);
    Ok(())
}

fn run_app(args: &MkApp) -> Result<(), Error> {
    let build_params = args.options.to_build_params()?;
    envvars::matches_saved(&build_params);

    let mut model = model::Model::new();
    let mut app = modeller::get_app(&mut model, &args.adef, &build_params)?;

    modeller::ensure_client_interfaces_satisfied(&model, &mut app)?;
    modeller::check_for_limits_conflicts(&app);

    generator::generate_app(&model, &app, &build_params)?;
    if !build_params.code_gen_only {
        generator::ninja::generate_for_app(&model, &app, &build_params)?;
    }
    generator::json::generate_app_dump(&model, &app, &build_params)?;

    envvars::save(&build_params)?;

    system::infoln!("Built", "app '{}'", app.name);
    Ok(())
}

fn run_exe(args: &MkExe) -> Result<(), Error> {
    let build_params = args.options.to_build_params()?;
    envvars::matches_saved(&build_params);

    let mut model = model::Model::new();
    let exe = modeller::model_exe(&mut model, &args.exe_path, &args.components, &build_params)?;

    for instance in &exe.component_instances {
        generator::generate_component(&model, model.component(instance.component), &build_params)?;
    }
    generator::generate_exe(&model, &exe, &build_params)?;
    if !build_params.code_gen_only {
        generator::ninja::generate_for_exe(&model, &exe, &build_params)?;
    }
    generator::json::generate_exe_dump(&model, &exe, &build_params)?;

    envvars::save(&build_params)?;

    system::infoln!("Built", "executable '{}'", exe.name);
    Ok(())
}

fn run_comp(args: &MkComp) -> Result<(), Error> {
    let build_params = args.options.to_build_params()?;

    let mut model = model::Model::new();
    let component = modeller::get_component(&mut model, &args.component_dir, &build_params)?;

    // Stand-alone components resolve their own service instance names.
    model.component_mut(component).is_standalone = true;

    generator::generate_component(&model, model.component(component), &build_params)?;

    system::infoln!("Built", "component '{}'", model.component(component).name);
    Ok(())
}

fn run_edit(args: &MkEdit) -> Result<(), Error> {
    let action = match args.action {
        EditActionArg::Add => edit::EditAction::Add,
        EditActionArg::Remove => edit::EditAction::Remove,
        EditActionArg::Rename => edit::EditAction::Rename,
    };

    if args.action == EditActionArg::Rename && args.new_name.is_none() {
        return Err(Error::Edit("A new name is required for a rename.".to_string()));
    }

    match args.kind {
        EditKindArg::App => {
            let sdef = args.sdef.as_deref().ok_or_else(|| {
                Error::Edit("App edits need an --sdef to edit.".to_string())
            })?;
            edit::edit_app(sdef, action, &args.name, args.new_name.as_deref())
        }
        EditKindArg::Module => {
            let sdef = args.sdef.as_deref().ok_or_else(|| {
                Error::Edit("Module edits need an --sdef to edit.".to_string())
            })?;
            edit::edit_module(sdef, action, &args.name, args.new_name.as_deref())
        }
        EditKindArg::Component => {
            let adef = args.adef.as_deref().ok_or_else(|| {
                Error::Edit("Component edits need an --adef to edit.".to_string())
            })?;
            edit::edit_component(adef, action, &args.name, args.new_name.as_deref())
        }
    }
}
