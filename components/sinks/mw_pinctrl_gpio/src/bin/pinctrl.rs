//! Bench tool for the bank 0 GPIO pins.
//!
//! ```sh
//! sudo pinctrl status
//! sudo pinctrl direction 0x0F
//! sudo pinctrl drive --ma8 0x01 --ma12 0x02
//! sudo pinctrl write 0b0101
//! sudo pinctrl toggle 0x01
//! ```
//!
//! Masks are decimal, `0x` hex or `0b` binary; bit *i* is `GPMI_D0i`.
//! Needs read/write access to `/dev/mem`. Built with the `cli` feature:
//! `cargo build -p mw-pinctrl-gpio --features cli`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use mw_pinctrl_gpio::parse_mask;

#[derive(Parser)]
#[command(name = "pinctrl", about = "Poke the pin-control GPIO bank directly")]
struct Cli {
    /// Physical memory device to map.
    #[arg(long, default_value = mw_linux_resources::DEV_MEM)]
    mem: PathBuf,

    /// More logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print input, output, direction and drive strengths.
    Status,
    /// Print the live input levels.
    Read,
    /// Make the pins outputs.
    Direction {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },
    /// Enable pull-ups on exactly these pins.
    Pullup {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },
    /// Set drive strengths; unlisted pins go back to 4 mA.
    Drive {
        #[arg(long, value_parser = parse_mask, default_value = "0")]
        ma8: u8,
        #[arg(long, value_parser = parse_mask, default_value = "0")]
        ma12: u8,
    },
    /// Write all eight output levels.
    Write {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },
    /// Drive these pins high.
    Set {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },
    /// Drive these pins low.
    Clear {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },
    /// Flip these pins.
    Toggle {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    run(cli)
}

#[cfg(target_os = "linux")]
fn run(cli: Cli) -> Result<()> {
    use anyhow::Context;
    use mw_pinctrl_gpio::GpioBank;

    let bank = GpioBank::open(&cli.mem)
        .with_context(|| format!("is {} readable and writable (try sudo)?", cli.mem.display()))?;

    match cli.command {
        Command::Status => {
            println!("input     {:#04x}", bank.read_input());
            println!("output    {:#04x}", bank.output());
            println!("direction {:#04x}", bank.direction());
            for (pin, strength) in bank.drive_strengths().iter().enumerate() {
                println!("  D0{pin}: {strength:?}");
            }
        }
        Command::Read => println!("{:#04x}", bank.read_input()),
        Command::Direction { mask } => bank.set_direction(mask),
        Command::Pullup { mask } => bank.set_pullup(mask),
        Command::Drive { ma8, ma12 } => bank.set_drive(ma8, ma12),
        Command::Write { mask } => bank.write_output(mask),
        Command::Set { mask } => bank.set_output(mask),
        Command::Clear { mask } => bank.clear_output(mask),
        Command::Toggle { mask } => bank.toggle_output(mask),
    }
    bank.close();
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: Cli) -> Result<()> {
    anyhow::bail!("pinctrl needs Linux /dev/mem")
}
