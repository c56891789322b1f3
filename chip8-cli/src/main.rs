//! Entrypoint for CLI
use std::{
    env, fs,
    io::{BufWriter, Write},
    process,
};

use chip8::{prelude::*, IMPL_VERSION};
use log::{debug, error, info};

mod config;
mod devices;
mod error;
mod render;

use self::{config::AppConfig, devices::HeadlessDevices, error::AppError, render::Frame};

/// Frames run when `--frames` is not given, ten seconds at 60 Hz.
const DEFAULT_FRAME_LIMIT: u64 = 600;

static USAGE: &str = r#"
usage: chip8 CMD [OPTIONS] FILE

commands:
    run     Run the target ROM file
    dis     Disassemble the target ROM into readable assembly

run options:
    --config PATH       YAML configuration file
    --frames N          Quit after N frames (default 600, 0 runs until halted)
    --screenshot PATH   Write the final frame as a PPM image

examples:
    chip8 run breakout.rom
    chip8 run --frames 600 --screenshot out.ppm breakout.rom
    chip8 dis breakout.rom
"#;

fn run_bytecode(args: RunArgs) -> Result<(), AppError> {
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    debug!("configuration: {config:?}");

    let mut vm = Chip8Vm::new(config.chip8_conf());
    vm.load_file(&args.filepath)?;
    info!("loaded {}", args.filepath);

    let mut driver = Driver::new(vm, HeadlessDevices::new(args.frame_limit()));
    let result = driver.run();
    let (vm, devices) = driver.into_parts();

    println!("{}", vm.dump_display()?);

    if let Some(path) = &args.screenshot {
        let frame = Frame::rasterize(
            devices.display(),
            config.foreground,
            config.background,
            config.scale.get(),
        );
        let mut file = BufWriter::new(fs::File::create(path)?);
        frame.write_ppm(&mut file)?;
        file.flush()?;
        info!("screenshot written to {path}");
    }

    match result {
        Ok(flow) => {
            info!("stopped after {} frames ({flow:?})", devices.frames());
            Ok(())
        }
        Err(err) => {
            error!("machine halted: {}", vm.dump_registers()?);
            Err(err.into())
        }
    }
}

fn run_disassembler(filepath: &str) -> Result<(), AppError> {
    let bytecode = fs::read(filepath)?;
    print!("{}", Disassembler::new(&bytecode));
    Ok(())
}

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new().env().init() {
        eprintln!("failed to initialise logger: {err}");
    }

    let result = match parse_args(env::args().skip(1)) {
        Some(Cmd::Run(args)) => run_bytecode(args),
        Some(Cmd::Dis { filepath }) => run_disassembler(&filepath),
        None => {
            print_usage();
            Err(AppError::usage())
        }
    };

    if let Err(err) = result {
        if !matches!(err.kind, error::ErrorKind::Usage) {
            error!("{err}");
        }
        process::exit(err.exit_code())
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Cmd> {
    match args.next()?.as_str() {
        "run" => parse_run_args(args).map(Cmd::Run),
        "dis" => Some(Cmd::Dis {
            filepath: consume_arg(&mut args)?,
        }),
        _ => None,
    }
}

fn parse_run_args(mut args: impl Iterator<Item = String>) -> Option<RunArgs> {
    let mut filepath = None;
    let mut config = None;
    let mut frames = DEFAULT_FRAME_LIMIT;
    let mut screenshot = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(consume_arg(&mut args)?),
            "--frames" => frames = consume_arg(&mut args)?.parse().ok()?,
            "--screenshot" => screenshot = Some(consume_arg(&mut args)?),
            flag if flag.starts_with("--") => return None,
            _ if filepath.is_none() => filepath = Some(arg),
            _ => return None,
        }
    }

    Some(RunArgs {
        filepath: filepath?,
        config,
        frames,
        screenshot,
    })
}

/// Consumes the next argument, if it exists.
fn consume_arg(args: &mut impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

#[derive(Debug, PartialEq, Eq)]
enum Cmd {
    /// Run file
    Run(RunArgs),
    /// Disassemble
    Dis { filepath: String },
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    filepath: String,
    config: Option<String>,
    /// Zero means no limit.
    frames: u64,
    screenshot: Option<String>,
}

impl RunArgs {
    fn frame_limit(&self) -> Option<u64> {
        (self.frames > 0).then_some(self.frames)
    }
}
