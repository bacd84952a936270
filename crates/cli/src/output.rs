//! Human and JSON rendering of command results

use anyhow::{Context, Result};
use common::{AttachedPort, Discovery, LocalDevice, OperationOutcome, RemoteDevice};
use serde::Serialize;
use std::collections::BTreeSet;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

pub fn print_discovery(discovery: Discovery, json: bool) -> Result<()> {
    if json {
        return print_json(&discovery);
    }

    let source = discovery.source;
    let devices = discovery.into_display_list();
    if let [notice] = devices.as_slice()
        && (notice.is_info() || notice.is_error())
    {
        println!("{}", notice.info);
        for hint in &notice.details {
            println!("  - {}", hint);
        }
        return Ok(());
    }

    match source {
        Some(source) => println!("Found {} USB device(s) via {}:\n", devices.len(), source),
        None => println!("Found {} USB device(s):\n", devices.len()),
    }
    for device in &devices {
        print_device(device);
    }
    Ok(())
}

fn print_device(device: &LocalDevice) {
    let mut flags = Vec::new();
    if device.is_published {
        flags.push("published");
    }
    if device.is_fallback {
        flags.push("lsusb");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };

    println!(
        "  {:<8} {} - {}{}",
        device.busid,
        device.usb_id(),
        device.device_name,
        flags
    );
    for detail in &device.details {
        println!("           {}", detail);
    }
}

pub fn print_published(busids: &BTreeSet<String>, json: bool) -> Result<()> {
    if json {
        return print_json(busids);
    }
    if busids.is_empty() {
        println!("No devices are published.");
    } else {
        for busid in busids {
            println!("{}", busid);
        }
    }
    Ok(())
}

pub fn print_remote(host: &str, devices: &[RemoteDevice], json: bool) -> Result<()> {
    if json {
        return print_json(&devices);
    }
    if devices.is_empty() {
        println!("{} exports no devices.", host);
        return Ok(());
    }
    println!("Devices exported by {}:\n", host);
    for device in devices {
        println!("  {}", device.info);
        for detail in &device.details {
            println!("      {}", detail);
        }
    }
    Ok(())
}

pub fn print_ports(ports: &[AttachedPort], json: bool) -> Result<()> {
    if json {
        return print_json(&ports);
    }
    if ports.is_empty() {
        println!("No remote devices attached.");
        return Ok(());
    }
    for port in ports {
        let remote = match (&port.remote_host, &port.remote_busid) {
            (Some(host), Some(busid)) => format!("{}/{}", host, busid),
            (Some(host), None) => host.clone(),
            (None, Some(busid)) => busid.clone(),
            (None, None) => "unknown remote".to_string(),
        };
        println!("  Port {}: {}", port.port, remote);
    }
    Ok(())
}

pub fn print_outcome(outcome: &OperationOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    if outcome.success {
        println!("{}", outcome.message);
    } else {
        eprintln!("Error: {}", outcome.message);
    }
    Ok(())
}
