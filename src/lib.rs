//! An LC-4 object file loader, simulator, and debugger.
//!
//! The LC-4 is a 16-bit teaching architecture: 16-bit words, 8 general purpose
//! registers, and a single 64K-word address space split into user/OS code and data regions.
//!
//! # Usage
//!
//! Programs arrive as binary object files (produced by an external assembler).
//! An object file is loaded into a [`Simulator`], which can then be stepped or run:
//!
//! ```
//! use lc4_sim::obj::{Block, ObjectFile};
//! use lc4_sim::sim::Simulator;
//! use lc4_sim::ast::reg_consts::R1;
//!
//! // CONST R1, #5 / ADDI R1, R1, #-1 / TRAP xFF (jumps to the halt sentinel)
//! let mut obj = ObjectFile::new();
//! obj.push(Block::Code { addr: 0x0000, words: vec![0x9205, 0x127F, 0xF0FF] });
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_bytes(&obj.to_bytes()).unwrap();
//! sim.pc = 0x0000;
//!
//! sim.run().unwrap();
//! assert!(sim.hit_halt());
//! assert_eq!(sim.reg_file[R1], 4);
//! ```
//!
//! If more granularity is needed, see the stepping functions on [`Simulator`]
//! and the [`sim`] module docs.
//!
//! The [`debugger`] module holds the command shell used by the `lc4` binary,
//! which drives the same stepping functions from text commands.
//!
//! [`Simulator`]: sim::Simulator
#![warn(missing_docs)]

pub mod ast;
pub mod obj;
pub mod sim;
pub mod debugger;
pub mod err;
