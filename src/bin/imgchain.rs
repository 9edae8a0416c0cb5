use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use imgchain::{disk::MAX_IMAGE_COUNT, workflow, Access, Error, Progress, Result};

fn usage() -> String {
    format!(
        "Usage:\n  \
         imgchain b|build <device> <image-list> [boot-number]\n    \
         write every listed image to the device and boot image boot-number (1 to {MAX_IMAGE_COUNT}, default 1)\n  \
         imgchain p|preview <device> <image-list> [boot-number]\n    \
         same as build, without writing anything to the device\n  \
         imgchain l|list <device>\n    \
         list the images on the device\n  \
         imgchain s|switch <device> <boot-number>\n    \
         boot image boot-number (1 to {MAX_IMAGE_COUNT}) from now on"
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run() -> Result<()> {
    imgchain::check_host()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [cmd, device, list] if is_build(cmd) => build(cmd, device, list, 1),
        [cmd, device, list, boot] if is_build(cmd) => {
            build(cmd, device, list, parse_boot_number(boot)?)
        }
        [cmd, device] if matches!(*cmd, "l" | "list") => {
            let listing = workflow::list(device)?;
            println!("{listing}");
            Ok(())
        }
        [cmd, device, boot] if matches!(*cmd, "s" | "switch") => {
            workflow::switch(device, parse_boot_number(boot)?)
        }
        _ => Err(Error::CommandLine(usage())),
    }
}

fn is_build(cmd: &str) -> bool {
    matches!(cmd, "b" | "build" | "p" | "preview")
}

fn build(cmd: &str, device: &str, list: &str, boot: usize) -> Result<()> {
    let access = match cmd {
        "p" | "preview" => Access::Preview,
        _ => Access::ReadWrite,
    };

    let show_progress = io::stdout().is_terminal();
    let mut total = 0;

    workflow::build(device, list, boot, access, |progress| match progress {
        Progress::Started { image, total_bytes } => {
            total = total_bytes;
            println!("Info: writing {image}\n{total_bytes} bytes total.");
        }
        Progress::Written(written) if show_progress => {
            print!("{written}/{total}\r");
            let _ = io::stdout().flush();
        }
        Progress::Written(_) => (),
        Progress::Finished => println!("Write completed."),
    })
}

fn parse_boot_number(arg: &str) -> Result<usize> {
    match arg.parse::<usize>() {
        Ok(boot) if (1..=MAX_IMAGE_COUNT).contains(&boot) => Ok(boot),
        _ => Err(Error::CommandLine(format!(
            "invalid boot number {arg}, expected 1 to {MAX_IMAGE_COUNT}\n{}",
            usage()
        ))),
    }
}
