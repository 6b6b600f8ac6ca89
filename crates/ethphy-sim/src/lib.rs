//! Ethernet PHY Line Simulator
//!
//! Drives [`ethphy_core::Frame`]s onto simulated MII, RGMII and RMII pins and
//! decodes them back, so a MAC model (or a loopback) can be checked against
//! exact timing, CRC and inter-frame gap rules.
//!
//! ## Pieces
//!
//! - [`sim`]: a single-threaded discrete-event scheduler over named,
//!   fixed-width pins, with optional change tracing
//! - [`clock`]: the square-wave clock task
//! - [`phy`]: per-interface line codecs behind shared [`Transmitter`] and
//!   [`Receiver`] tasks
//! - [`checker`]: [`ExpectedFrames`], comparing what arrives with what was sent
//! - [`config`]: transmitter timing and interface options
//!
//! ## Example
//!
//! ```rust
//! use ethphy_core::{ClockRate, Frame};
//! use ethphy_sim::{ClockSource, ExpectedFrames, MiiPins, MiiRxLine, MiiTxLine};
//! use ethphy_sim::{Receiver, Simulator, StopReason, Transmitter, TxConfig};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let rate = ClockRate::Clk25MHz;
//! let mut sim = Simulator::new();
//! let clk = sim.add_pin("clk", 1);
//! let source = ClockSource::new(rate, clk);
//! let clock = source.clock();
//! sim.spawn(Box::new(source));
//!
//! let pins = MiiPins::add(&mut sim, "rx");
//! let mut rng = StdRng::seed_from_u64(7);
//! let frames = vec![
//!     Frame::builder().build(&mut rng),
//!     Frame::builder().inter_frame_gap(rate.minimum_ifg_ns()).build(&mut rng),
//! ];
//!
//! let mut tx = Transmitter::new(MiiTxLine::new(sim.pins(), pins, rate)?, clock, TxConfig::mii().immediate());
//! tx.send(frames.clone())?;
//! let rx = Receiver::new(MiiRxLine::new(sim.pins(), pins, rate)?, clock)
//!     .with_handler(ExpectedFrames::new(frames));
//! let results = rx.context();
//! sim.spawn(Box::new(tx));
//! sim.spawn(Box::new(rx));
//!
//! assert_eq!(sim.run()?, StopReason::Terminated);
//! assert!(results.borrow().is_clean());
//! # Ok::<(), ethphy_sim::SimError>(())
//! ```

pub mod checker;
pub mod clock;
pub mod config;
pub mod error;
pub mod phy;
pub mod sim;

pub use checker::ExpectedFrames;
pub use clock::{Clock, ClockControl, ClockSource};
pub use config::{Duplex, LinkStatus, PinAssignment, RmiiPortLayout, TxConfig};
pub use error::{SimError, SimResult};
pub use phy::{
    CompletionHook, FrameHandler, LineDecoder, LineEncoder, LineWord, MiiPins, MiiReceiver, MiiRxLine,
    MiiTransmitter, MiiTxLine, Receiver, ReceiverContext, RgmiiPins, RgmiiReceiver, RgmiiRxLine,
    RgmiiTransmitter, RgmiiTxLine, RmiiPins, RmiiReceiver, RmiiRxLine, RmiiTransmitter, RmiiTxLine,
    Transmitter, TxStats,
};
pub use sim::{PinBank, PinEvent, PinId, SimContext, Simulator, StopReason, Task, Wait};
