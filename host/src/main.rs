//! One-step-proof host CLI
//!
//! Re-executes block ranges described by JSON trace inputs and prints the
//! state hashes or the encoded snapshot for a disputed state.

mod io;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn};
use osp_core::prelude::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "osp")]
#[command(about = "State generation for optimistic-rollup one-step proofs")]
#[command(version)]
struct Cli {
    /// Prover configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the state hashes of one or more trace inputs
    Hashes {
        /// Trace input JSON files, traced concurrently
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,
    },

    /// Encode the state whose hash is `target`
    Prove {
        #[arg(short, long)]
        input: PathBuf,

        /// State hash (0x-prefixed hex)
        #[arg(short, long)]
        target: String,

        /// Where to write the encoded snapshot
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print every generated state of a trace input
    Trace {
        #[arg(short, long)]
        input: PathBuf,

        /// Also save the states (bincode)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the states saved by `trace --output`
    Show {
        #[arg(short, long)]
        states: PathBuf,
    },

    /// Generate a sample trace input
    Sample {
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = io::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Hashes { input } => cmd_hashes(input, config).await?,
        Commands::Prove {
            input,
            target,
            output,
        } => cmd_prove(input, target, output, config).await?,
        Commands::Trace { input, output } => cmd_trace(input, output, config).await?,
        Commands::Show { states } => print_states(&io::load_states(&states)?),
        Commands::Sample { output } => cmd_sample(output)?,
    }

    Ok(())
}

async fn cmd_hashes(inputs: Vec<PathBuf>, config: ProverConfig) -> Result<()> {
    // One driver and one state copy per input.
    let handles: Vec<_> = inputs
        .iter()
        .cloned()
        .map(|path| {
            let config = config.clone();
            tokio::task::spawn_blocking(move || -> Result<Vec<Hash>> {
                let input = io::load_input_json(&path)?;
                let hashes = TraceDriver::new(config)
                    .generate_state_hashes(&input)
                    .with_context(|| format!("Failed to trace {path:?}"))?;
                Ok(hashes)
            })
        })
        .collect();

    for (path, handle) in inputs.iter().zip(handles) {
        let hashes = handle.await??;
        info!("{path:?}: {} states", hashes.len());
        println!("{}", path.display());
        for hash in &hashes {
            println!("  {}", io::format_hash(hash));
        }
    }

    Ok(())
}

async fn cmd_prove(
    input_path: PathBuf,
    target: String,
    output_path: PathBuf,
    config: ProverConfig,
) -> Result<()> {
    let input = io::load_input_json(&input_path)?;
    let target = io::parse_hash(&target)?;

    let proof = tokio::task::spawn_blocking(move || TraceDriver::new(config).prove_state(&input, target))
        .await?
        .with_context(|| format!("Failed to prove {}", io::format_hash(&target)))?;

    io::save_bytes(&proof, &output_path)?;
    info!("wrote {} bytes to {output_path:?}", proof.len());
    println!("0x{}", hex::encode(&proof));

    Ok(())
}

async fn cmd_trace(input_path: PathBuf, output: Option<PathBuf>, config: ProverConfig) -> Result<()> {
    let input = io::load_input_json(&input_path)?;
    let trace = tokio::task::spawn_blocking(move || TraceDriver::new(config).trace_range(&input, None))
        .await??;

    print_states(&trace.states);
    for (index, receipt) in trace.receipts.iter().enumerate() {
        if receipt.is_success() {
            continue;
        }
        if receipt.status.is_revert() {
            warn!("transaction {index} reverted after {} gas", receipt.gas_used);
        } else if receipt.status.is_halt() {
            warn!("transaction {index} halted after {} gas", receipt.gas_used);
        }
    }

    if let Some(path) = output {
        io::save_states(&trace.states, &path)?;
        info!("saved {} states to {path:?}", trace.states.len());
    }

    Ok(())
}

fn print_states(states: &[GeneratedState]) {
    for (index, state) in states.iter().enumerate() {
        let hash = io::format_hash(&state.hash());
        match state {
            GeneratedState::Block(s) => {
                println!("{index:>6} block       {hash} gas used {}", s.cumulative_gas_used)
            }
            GeneratedState::Transaction(s) => {
                println!("{index:>6} transaction {hash} gas used {}", s.cumulative_gas_used)
            }
            GeneratedState::Instruction(step) => {
                println!("{index:>6} instruction {hash} gas {}", step.gas)
            }
        }
    }
}

fn cmd_sample(output_path: PathBuf) -> Result<()> {
    let input = io::sample_input();
    io::save_input_json(&input, &output_path)?;

    println!("Sample input saved to {output_path:?}");
    println!("  Blocks: {}", input.blocks.len());
    println!("  Transactions: {}", input.transaction_count());

    Ok(())
}
