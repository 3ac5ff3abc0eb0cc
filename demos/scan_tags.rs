//! Interactive tag scanner for an ID01 reader on a serial port.
//!
//! Polls for tags, dumps the user bank of each tag found and offers to
//! rewrite the EPC or the user data.
//!
//! ```text
//! cargo run --example scan_tags --features serial -- /dev/ttyUSB0
//! ```

use clap::Parser;
use id01_rfid::{
    BuzzerMode, Id01Reader, MemoryBank, RfidError, RfidTransport, SerialConfig, SerialTransport,
    parse_word_list,
};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "Scan and edit UHF tags with a DFRobot ID01 reader")]
struct Args {
    /// Serial port the reader is attached to
    port: String,

    /// Baud rate
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Beep when a tag is detected
    #[arg(long)]
    beep: bool,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing_subscriber::filter::LevelFilter,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(args.log_level)
        .with_target(false)
        .try_init();

    let config = SerialConfig {
        baud_rate: args.baud,
        ..SerialConfig::default()
    };
    let transport = match SerialTransport::with_config(&args.port, &config) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Cannot open {}: {}", args.port, e);
            return ExitCode::FAILURE;
        }
    };
    let mut rfid = Id01Reader::with_timeout(transport, Duration::from_millis(args.timeout_ms));

    match rfid.get_version() {
        Ok(version) => println!("RFID reader version: {}", version),
        Err(e) => println!("RFID reader version: {}", e),
    }

    let buzzer = if args.beep {
        BuzzerMode::Beep
    } else {
        BuzzerMode::Silent
    };
    if let Err(e) = rfid.set_buzzer(buzzer) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    println!("Scanning for RFID tags, press Ctrl-C to exit");
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        match rfid.request_tag_identification() {
            Ok(Some(epc)) => {
                if let Err(e) = on_tag(&mut rfid, &epc, &mut input) {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
            Ok(None) => {}
            Err(e) if e.is_bus_fault() => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
            Err(e) => println!("{}", e),
        }
    }
}

fn on_tag<T: RfidTransport>(
    rfid: &mut Id01Reader<T>,
    epc: &[u16],
    input: &mut impl BufRead,
) -> io::Result<()> {
    println!("Tag detected: {:?}", epc);
    match rfid.read_words_from_tag(MemoryBank::User, 0, 8) {
        Ok(Some(data)) => println!("   User data: {:?}", data),
        Ok(None) => println!("   User data: {}", rfid.last_error_message()),
        Err(e) => println!("   User data: {}", e),
    }

    println!("Type (E) rewrite tag EPC ID, (U) to write user data or (Return) to rescan");
    let action = prompt(input, "Action: ")?;
    match action.to_uppercase().as_str() {
        "E" => {
            let line = prompt(input, "Enter 1 to 6 comma-separated EPC ID words: ")?;
            write_words(rfid, MemoryBank::Epc, 2, &line);
        }
        "U" => {
            let line = prompt(input, "Enter 1 to 8 comma-separated user data words: ")?;
            write_words(rfid, MemoryBank::User, 0, &line);
        }
        "" => {}
        _ => println!("Unknown command: [{}]", action),
    }
    Ok(())
}

fn write_words<T: RfidTransport>(rfid: &mut Id01Reader<T>, bank: MemoryBank, addr: u8, line: &str) {
    let result: Result<(), RfidError> =
        parse_word_list(line).and_then(|words| rfid.write_words_to_tag(bank, addr, &words));
    match result {
        Ok(()) => println!("Result: OK"),
        Err(e) => println!("Result: {}", e),
    }
}

fn prompt(input: &mut impl BufRead, message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim().to_string())
}
