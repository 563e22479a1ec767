use std::env;

use bench_dmm::bus::{BusConfig, SharedBus, open_serial};
use bench_dmm::pm2534::Pm2534;
use bench_dmm::poll::{PollConfig, SystemClock};
use bench_dmm::types::{Function, RangeSetting, Trigger};
use inquire::Select;

// Configuration constants - adjust these for your setup
const GPIB_ADDRESS: u8 = 22;
const DIGITS: u8 = 3;
const RANGE_OHM: f64 = 3e3;

fn main() {
    env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select the GPIB adapter:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let mut bus = open_serial(&port_name, &BusConfig::default()).expect("Failed to open serial port");
    bus.init().expect("Failed to initialise the adapter");
    let bus = SharedBus::new(bus);

    let dmm = Pm2534::new(bus, GPIB_ADDRESS).expect("Invalid GPIB address");
    dmm.reset().unwrap();

    match dmm.get_front_rear().unwrap() {
        Some(true) => println!("Inputs: front"),
        Some(false) => println!("Inputs: rear"),
        None => println!("No answer from address {}", GPIB_ADDRESS),
    }

    if let Some(status) = dmm.get_status().unwrap() {
        println!("{:#?}", status);
        println!(
            "Function {:?}, range {:?}, resolution {:?}",
            status.function(),
            status.range_display(),
            status.resolution().map(|r| r.as_str())
        );
    }

    dmm.set_function(Function::RTW).unwrap();
    dmm.set_trigger(Trigger::K).unwrap();
    dmm.set_digits(DIGITS).unwrap();
    let range = RangeSetting::ceiling(Function::RTW, RANGE_OHM).expect("Range not in table");
    dmm.set_range(Function::RTW, range).unwrap();
    println!("Set 2-wire resistance, {} digits, range {}Ω", DIGITS, RANGE_OHM);

    match dmm.poll_measure(&SystemClock, &PollConfig::default()).unwrap() {
        Some(value) => println!("Measured: {}", value),
        None => println!("No measurement within the poll deadline"),
    }
}
