//! Keyfob simulator
//!
//! Runs complete wake cycles of the keyfob on simulated hardware against a
//! simulated lock controller and BLE central.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use keyfob::config::{BONDING_PEER, KEY_EXCHANGE_PEER, OWN_ADDRESS};
use keyfob::device::{ALERT_LEVEL_UUID, RFID_CHARACTERISTIC_UUID};
use keyfob::sim::{LockEvent, SimAir, SimBle, SimBoard, SimLock, SimRadio};
use keyfob::store::RFID_KEY_SIZE;
use keyfob::{
    Clock, CredentialStore, Hardware, Keyfob, KeyfobConfig, LoopStatus, ManualClock, MasterKey,
    MemoryCredentialStore, RfidKey,
};
use log::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Give up on a wake cycle after this many loop iterations
const MAX_ITERATIONS: usize = 100_000;

#[derive(Parser)]
#[command(name = "keyfob-sim", version, about = "Simulate keyfob wake cycles")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Simulated milliseconds per main loop iteration
    #[arg(long, default_value_t = 50, global = true)]
    tick: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pair with a new lock over the radio, then unlock with the derived key
    PairRadio,
    /// Bond with a BLE central and receive its RFID credential
    PairBle {
        /// RFID credential handed over by the central, as hex
        #[arg(long, default_value = "00112233445566778899")]
        rfid: String,
    },
    /// Press the button and unlock with a pre-shared key
    Unlock {
        /// Master key shared with the lock, as hex
        #[arg(long, default_value = "000102030405060708090a0b0c0d0e0f")]
        key: String,
        /// Give the lock a different key so authentication fails
        #[arg(long)]
        wrong_key: bool,
    },
    /// Wake by BLE connection with the alert level set
    Alert,
}

/// Keyfob, lock and the shared simulated world
struct Simulation {
    air: SimAir,
    radio: SimRadio,
    ble: SimBle,
    board: SimBoard,
    clock: ManualClock,
    tick: u64,
}

impl Simulation {
    fn new(tick: u64) -> Self {
        let air = SimAir::new();
        let radio = air.endpoint(OWN_ADDRESS);
        Self {
            air,
            radio,
            ble: SimBle::new(),
            board: SimBoard::new(),
            clock: ManualClock::starting_at(0),
            tick,
        }
    }

    fn keyfob(&self, store: MemoryCredentialStore) -> Keyfob {
        Keyfob::new(
            KeyfobConfig::default(),
            Hardware {
                radio: Box::new(self.radio.clone()),
                ble: Box::new(self.ble.clone()),
                store: Box::new(store),
                board: Box::new(self.board.clone()),
                clock: Box::new(self.clock.clone()),
            },
        )
    }

    fn lock(&self) -> SimLock {
        SimLock::new(self.air.endpoint(KEY_EXCHANGE_PEER))
    }

    /// Wake the keyfob and poll it, the lock and the central until it sleeps
    fn cycle(&self, keyfob: &mut Keyfob, lock: &mut SimLock) -> Result<Vec<LockEvent>> {
        let started = self.clock.now_ms();
        let mut events = Vec::new();

        if keyfob.wake() == LoopStatus::Running {
            let mut iterations = 0;
            loop {
                if let Some(event) = lock.poll(self.clock.now_ms()) {
                    events.push(event);
                }
                lock.serve_credential(&self.ble, BONDING_PEER);

                if keyfob.poll() == LoopStatus::Asleep {
                    break;
                }
                self.clock.advance(self.tick);

                iterations += 1;
                if iterations == MAX_ITERATIONS {
                    bail!("keyfob still awake after {} ms", self.clock.now_ms() - started);
                }
            }
        }

        let report = keyfob.report();
        println!(
            "wake cycle: {} ms, woke as {}, slept on {}",
            self.clock.now_ms() - started,
            report
                .wake
                .map_or_else(|| "unknown".to_string(), |wake| wake.to_string()),
            report
                .sleep_reason
                .map_or_else(|| "nothing".to_string(), |reason| reason.to_string()),
        );
        if let Some(error) = &report.setup_error {
            println!("  setup error: {}", error);
        }
        for event in &events {
            println!("  lock: {:?}", event);
        }
        Ok(events)
    }
}

fn parse_key<const N: usize>(text: &str, what: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(text).with_context(|| format!("{} is not valid hex", what))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("{} must be {} bytes, got {}", what, N, len))
}

fn pair_radio(sim: &Simulation) -> Result<()> {
    // Radio only: the BLE module is not fitted
    sim.ble.set_fail_init(true);
    sim.board.set_cable_present(true);

    let mut lock = sim.lock();
    lock.start_pairing(sim.clock.now_ms());
    let mut keyfob = sim.keyfob(MemoryCredentialStore::new());

    sim.cycle(&mut keyfob, &mut lock)?;
    let Some(peer) = keyfob.store().paired_peer() else {
        bail!("pairing did not store a credential");
    };
    if let Some(key) = keyfob.store().credential(peer) {
        println!("  paired with {} using key {}", peer, key.fingerprint());
    }

    sim.board.set_cable_present(false);
    sim.board.set_button_pressed(true);
    sim.clock.advance(10_000);
    sim.cycle(&mut keyfob, &mut lock)?;

    if !keyfob.report().authenticated {
        bail!("unlock with the derived key failed");
    }
    Ok(())
}

fn pair_ble(sim: &Simulation, rfid: &str) -> Result<()> {
    let rfid = RfidKey::new(parse_key::<RFID_KEY_SIZE>(rfid, "RFID credential")?);
    sim.board.set_cable_present(true);

    let mut lock = sim.lock().with_rfid(rfid.clone());
    let mut keyfob = sim.keyfob(MemoryCredentialStore::new());

    // The central shows up once the keyfob advertises
    sim.ble.connect();
    sim.ble.request_passcode();
    sim.ble.bond();
    sim.cycle(&mut keyfob, &mut lock)?;

    match keyfob.store().rfid_credential() {
        Some(stored) if stored == rfid => {
            println!("  stored RFID credential {}", stored.fingerprint());
            Ok(())
        }
        _ => bail!("bonding did not store the RFID credential"),
    }
}

fn unlock(sim: &Simulation, key: &str, wrong_key: bool) -> Result<()> {
    let key = MasterKey::new(parse_key(key, "master key")?);
    let lock_key = if wrong_key {
        let mut bytes = *key.as_bytes();
        bytes[0] ^= 0xFF;
        MasterKey::new(bytes)
    } else {
        key.clone()
    };

    let mut store = MemoryCredentialStore::new();
    store.set_credential(KEY_EXCHANGE_PEER, &key)?;
    let mut lock = sim.lock().with_key(lock_key);
    let mut keyfob = sim.keyfob(store);

    sim.board.set_button_pressed(true);
    sim.cycle(&mut keyfob, &mut lock)?;

    println!(
        "  unlock {}",
        if keyfob.report().authenticated {
            "acknowledged"
        } else {
            "not acknowledged"
        }
    );
    Ok(())
}

fn alert(sim: &Simulation) -> Result<()> {
    sim.ble.preprogram(&[
        (RFID_CHARACTERISTIC_UUID, vec![0; RFID_KEY_SIZE]),
        (ALERT_LEVEL_UUID, vec![2]),
    ]);
    sim.ble.set_link(true, true);

    let mut lock = sim.lock();
    let mut keyfob = sim.keyfob(MemoryCredentialStore::new());
    sim.cycle(&mut keyfob, &mut lock)?;

    println!("  {} alert pulses played", keyfob.report().alert_pulses);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let sim = Simulation::new(cli.tick);
    info!("Simulating with {} ms ticks", cli.tick);

    match cli.command {
        Command::PairRadio => pair_radio(&sim),
        Command::PairBle { rfid } => pair_ble(&sim, &rfid),
        Command::Unlock { key, wrong_key } => unlock(&sim, &key, wrong_key),
        Command::Alert => alert(&sim),
    }
}
