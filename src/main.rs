//! Lists the serial ports present on this machine, one per line, with whatever usb metadata
//! could be recovered for each.

#[cfg(target_os = "windows")]
fn main() {
    use comport_enum::SerialPortEnumerator;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut ports = match SerialPortEnumerator::enumerate_present_ports() {
        Ok(ports) => ports,
        Err(error) => {
            eprintln!("could not enumerate serial ports: {}", error);
            std::process::exit(1);
        }
    };
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));

    for port in &ports {
        println!("{}", port);
    }
    eprintln!("{} ports found", ports.len());
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("serial port enumeration is only available on windows");
    std::process::exit(1);
}
