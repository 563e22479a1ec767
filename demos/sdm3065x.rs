use std::env;

use bench_dmm::scpi::ScpiConfig;
use bench_dmm::sdm3065x::{Nplc, Sdm3065x};

// Configuration constants - adjust these for your setup
const DEFAULT_HOST: &str = "10.0.0.114";
const RANGE: &str = "20V";
// 1 ms in a 50 Hz grid
const NPLC: Nplc = Nplc::P0_05;
const READINGS: usize = 10;

fn main() {
    env_logger::init();

    let host = env::args().nth(1).unwrap_or_else(|| DEFAULT_HOST.to_owned());
    println!("Using instrument at {}", host);

    let dmm = Sdm3065x::connect(host, &ScpiConfig::default());
    dmm.reset().unwrap();

    let first = dmm.get_voltage_dc(RANGE, NPLC).unwrap();
    println!("{:?}", first.map(|v| v.to_string()));

    // Further readings reuse the running acquisition.
    for _ in 0..READINGS {
        match dmm.read() {
            Ok(Some(value)) => println!("{} V", value),
            Ok(None) => println!("Unreadable sample"),
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        }
    }
}
