//! Console output utilities

use std::cell::RefCell;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

pub fn enable_verbose() {
    VERBOSE.store(true, Ordering::Relaxed)
}

thread_local! {
    static STDOUT: RefCell<StandardStream> = RefCell::new(make_stream(false));
    static STDERR: RefCell<StandardStream> = RefCell::new(make_stream(true));
}

fn make_stream(stderr: bool) -> StandardStream {
    let is_terminal = if stderr {
        std::io::stderr().is_terminal()
    } else {
        std::io::stdout().is_terminal()
    };
    let color_choice = if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    if stderr {
        StandardStream::stderr(color_choice)
    } else {
        StandardStream::stdout(color_choice)
    }
}

pub(crate) fn print_status_tag(color_spec: &ColorSpec, tag: &str) {
    STDOUT.with_borrow_mut(|stdout| {
        let _ = stdout.set_color(color_spec);
        let _ = write!(stdout, "{:>12}", tag);
        let _ = stdout.reset();
        print!(" ");
    });
}

pub(crate) fn eprint_status_tag(color_spec: &ColorSpec, tag: &str) {
    STDERR.with_borrow_mut(|stderr| {
        let _ = stderr.set_color(color_spec);
        let _ = write!(stderr, "{:>12}", tag);
        let _ = stderr.reset();
        eprint!(" ");
    });
}

pub fn info_color() -> ColorSpec {
    let mut x = ColorSpec::new();
    x.set_fg(Some(Color::Green)).set_bold(true);
    x
}

pub fn hint_color() -> ColorSpec {
    let mut x = ColorSpec::new();
    x.set_fg(Some(Color::Yellow)).set_bold(true);
    x
}

pub fn error_color() -> ColorSpec {
    let mut x = ColorSpec::new();
    x.set_fg(Some(Color::Red)).set_bold(true);
    x
}

macro_rules! infoln {
    ($status:expr, $($args:tt)*) => {
        {
            let status = { $status };
            $crate::system::print_status_tag(&$crate::system::info_color(), status);
            println!($($args)*);
        }
    };
}
pub(crate) use infoln;

macro_rules! errorln {
    ($status:expr, $($args:tt)*) => {
        {
            let status = { $status };
            $crate::system::eprint_status_tag(&$crate::system::error_color(), status);
            eprintln!($($args)*);
        }
    };
}
pub(crate) use errorln;

/// Warnings go to stderr and never change the exit status.
macro_rules! warnln {
    ($status:expr, $($args:tt)*) => {
        {
            let status = { $status };
            $crate::system::eprint_status_tag(&$crate::system::hint_color(), status);
            eprintln!($($args)*);
        }
    };
}
pub(crate) use warnln;

macro_rules! verboseln {
    ($status:expr, $($args:tt)*) => {
        {
            if ($crate::system::is_verbose()) {
                let status = { $status };
                $crate::system::print_status_tag(&$crate::system::hint_color(), status);
                println!($($args)*);
            }
        }
    };
}
pub(crate) use verboseln;
