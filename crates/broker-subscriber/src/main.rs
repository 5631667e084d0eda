use std::io::{BufRead, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;

use broker_wire::{ERR_SAME_ID, FRAME_LEN, Payload, decode_publish, render};
use clap::Parser;

/// Subscriber client for the broker: announces an identity, forwards
/// stdin control commands, and renders every publish frame it
/// receives. Connects once; it does not auto-reconnect on disconnect
/// (matching the reference client this was ported from).
#[derive(Debug, Parser)]
#[command(name = "broker-subscriber")]
struct Args {
    /// Identity announced to the broker on connect.
    identity: String,

    /// Broker's IPv4 address.
    server_ip: String,

    /// Broker's TCP port.
    server_port: u16,

    /// Raise log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let stream = match TcpStream::connect((args.server_ip.as_str(), args.server_port)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}:{}: connect: {e}", file!(), line!());
            std::process::exit(1);
        }
    };
    if let Err(e) = set_socket_options(&stream) {
        eprintln!("{}:{}: socket options: {e}", file!(), line!());
        std::process::exit(1);
    }

    let mut writer = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}:{}: clone stream: {e}", file!(), line!());
            std::process::exit(1);
        }
    };
    if let Err(e) = writer.write_all(format!("{}\n", args.identity).as_bytes()) {
        eprintln!("{}:{}: send identity: {e}", file!(), line!());
        std::process::exit(1);
    }

    std::thread::spawn(move || forward_stdin(writer));

    read_frames(stream);
}

fn forward_stdin(mut writer: TcpStream) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim_end() == "exit" {
            std::process::exit(0);
        }
        if writer.write_all(format!("{line}\n").as_bytes()).is_err() {
            break;
        }
    }
}

fn read_frames(mut stream: TcpStream) {
    let mut buf = [0u8; FRAME_LEN];
    loop {
        match stream.read_exact(&mut buf) {
            Ok(()) => {}
            Err(_) => {
                tracing::debug!("server connection closed");
                return;
            }
        }
        let frame = match decode_publish(&buf) {
            Ok(f) => f,
            Err(e) => {
                tracing::trace!(error = %e, "dropping malformed frame");
                continue;
            }
        };
        if let Payload::Reply(text) = &frame.payload {
            if text.as_str() == ERR_SAME_ID {
                tracing::debug!("duplicate identity rejected by broker");
                return;
            }
            print!("{}", text.as_str());
            continue;
        }
        println!("{}", render(&frame));
    }
}

fn set_socket_options(stream: &TcpStream) -> std::io::Result<()> {
    let fd = stream.as_raw_fd();
    unsafe {
        setsockopt_bool(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, true)?;
        setsockopt_bool(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, true)?;
        setsockopt_bool(fd, libc::IPPROTO_TCP, libc::TCP_CORK, true)?;
    }
    Ok(())
}

unsafe fn setsockopt_bool(
    fd: libc::c_int,
    level: libc::c_int,
    name: libc::c_int,
    value: bool,
) -> std::io::Result<()> {
    let value: libc::c_int = libc::c_int::from(value);
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            std::ptr::from_ref(&value).cast::<libc::c_void>(),
            core::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 { Err(std::io::Error::last_os_error()) } else { Ok(()) }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
