//! IMAS Emulator - CLI Entry Point
//!
//! Commands:
//! - `imas-emu run <image>` - Run a memory image loaded from a file
//! - `imas-emu pipe` - Classic stream protocol: breakpoint list, memory
//!   image, and program input all on stdin, bare output

use clap::{Parser, Subcommand};
use imas::{
    BreakpointMonitor, ConsoleIo, Cpu, HaltReason, load_image, parse_breakpoints, parse_image,
};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "imas-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the IMAS teaching machine, an IAS-style single-accumulator computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a memory image until the program halts
    Run {
        /// Path to the memory image (lines of hex `address value` pairs)
        image: PathBuf,
        /// Snapshot the registers whenever this address is fetched (repeatable)
        #[arg(short = 'b', long = "breakpoint", value_name = "ADDR")]
        breakpoints: Vec<u16>,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "1000000")]
        max_cycles: u64,
        /// Log each executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Write the final machine state as JSON
        #[arg(long, value_name = "FILE")]
        dump_state: Option<PathBuf>,
    },
    /// Read the breakpoint list, the memory image, and the program's input
    /// from stdin as a single stream
    Pipe,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            image,
            breakpoints,
            max_cycles,
            trace,
            dump_state,
        }) => {
            init_logging(trace);
            run_image(&image, breakpoints, max_cycles, dump_state);
        }
        Some(Commands::Pipe) => {
            init_logging(false);
            run_pipe();
        }
        None => {
            println!("IMAS Emulator v0.1.0");
            println!("An IAS-style single-accumulator machine emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(trace: bool) {
    let level = if trace {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init().unwrap();
}

fn run_image(path: &Path, breakpoints: Vec<u16>, max_cycles: u64, dump_state: Option<PathBuf>) {
    println!("🔧 Running: {}", path.display());

    let image = match load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };
    println!("📂 Loaded {} words", image.len());

    let mut cpu = Cpu::new();
    cpu.mem.load_image(&image);
    let monitor: BreakpointMonitor = breakpoints.into_iter().collect();

    let stdin = std::io::stdin();
    let mut io = ConsoleIo::new(stdin.lock(), std::io::stdout());

    println!();
    println!("━━━ Execution ━━━");

    let executed = match cpu.run_limited(max_cycles, &mut io, &monitor, |snap| {
        println!("{}", snap);
    }) {
        Ok(executed) => executed,
        Err(e) => {
            eprintln!("❌ CPU error: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", executed);
    match cpu.halt_reason() {
        Some(reason) => println!("State: halted ({})", reason),
        None => println!("State: running"),
    }
    println!("AC = 0x{:04X} ({})", cpu.regs.ac, cpu.regs.ac);
    println!("MQ = 0x{:04X} ({})", cpu.regs.mq, cpu.regs.mq);
    println!("PC = 0x{:04X}", cpu.regs.pc);

    if let Some(out_path) = dump_state {
        if let Err(e) = write_state(&cpu, &out_path) {
            eprintln!("❌ Failed to write state: {}", e);
            std::process::exit(1);
        }
        println!("✓ State written to {}", out_path.display());
    }

    if cpu.is_running() {
        println!();
        println!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            max_cycles
        );
    }

    match cpu.halt_reason() {
        Some(HaltReason::Normal) | None => {}
        Some(reason) => {
            eprintln!("❌ Machine fault: {}", reason);
            std::process::exit(1);
        }
    }
}

fn run_pipe() {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    let breakpoints = match parse_breakpoints(&mut input) {
        Ok(addrs) => addrs,
        Err(e) => {
            eprintln!("❌ Invalid breakpoint list: {}", e);
            std::process::exit(1);
        }
    };

    let image = match parse_image(&mut input) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Invalid memory image: {}", e);
            std::process::exit(1);
        }
    };

    let mut cpu = Cpu::new();
    cpu.mem.load_image(&image);
    let monitor: BreakpointMonitor = breakpoints.into_iter().collect();

    // The rest of stdin belongs to the running program's IN instructions
    let mut io = ConsoleIo::new(input, std::io::stdout());

    match cpu.run(&mut io, &monitor, |snap| println!("{}", snap)) {
        Ok(HaltReason::Normal) => {}
        Ok(reason) => {
            eprintln!("❌ Machine fault: {}", reason);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ CPU error: {}", e);
            std::process::exit(1);
        }
    }
}

fn write_state(cpu: &Cpu, path: &Path) -> Result<(), String> {
    let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
    serde_json::to_writer_pretty(file, cpu).map_err(|e| e.to_string())
}
