use std::thread;

use anyhow::Context;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tally_export::{export_on_exit, DirectoryExporter, ExportFormat};
use tally_hist::{Axis, Counter, HistPoint, Histogram, RunningStats};
use tally_store::{
    BookOptions, BookStore, Combine, Entry, Handle, LayoutKind, LayoutSpec, StoreResult,
};
use tracing::{debug, info};

use crate::cli::*;
use crate::config::{AggregateConfig, AggregateKind, RunConfig};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Check(args) => cmd_check(args),
    }
}

/// An entry booked from the config, with what the workers need to fill it.
#[derive(Clone, Debug)]
pub struct Booked {
    pub entry: Entry,
    pub kind: AggregateKind,
    pub axes: Vec<Axis>,
}

fn layout_spec<V: Combine>(agg: &AggregateConfig, workers: usize) -> LayoutSpec<V> {
    match agg.layout {
        LayoutKind::Single => LayoutSpec::single(),
        LayoutKind::ReplicatedCopies => {
            LayoutSpec::replicated_combined(agg.instances.unwrap_or(workers))
        }
        LayoutKind::SharedBuffered => agg
            .buffer_capacity
            .map_or_else(LayoutSpec::shared, LayoutSpec::shared_with_capacity),
    }
}

/// Book every aggregate in `config`. Must run on the store's owning thread.
pub fn book_all(
    store: &mut BookStore,
    config: &RunConfig,
    workers: usize,
) -> anyhow::Result<Vec<Booked>> {
    let mut booked = Vec::with_capacity(config.aggregates.len());
    for agg in &config.aggregates {
        let options = BookOptions {
            store_on_exit: agg.store_on_exit,
        };
        let (entry, axes) = match agg.kind {
            AggregateKind::Counter => {
                let spec = layout_spec::<Counter>(agg, workers);
                (store.book_with(&agg.path, &agg.name, spec, (), options)?, Vec::new())
            }
            AggregateKind::Histogram => {
                let hist = agg.histogram_spec()?;
                let axes = hist.axes().to_vec();
                let spec = layout_spec::<Histogram>(agg, workers);
                (store.book_with(&agg.path, &agg.name, spec, hist, options)?, axes)
            }
            AggregateKind::Stats => {
                let spec = layout_spec::<RunningStats>(agg, workers);
                (store.book_with(&agg.path, &agg.name, spec, (), options)?, Vec::new())
            }
        };
        booked.push(Booked {
            entry,
            kind: agg.kind,
            axes,
        });
    }
    Ok(booked)
}

enum Writer {
    Counter(Handle<Counter>),
    Histogram(Handle<Histogram>, Vec<Axis>),
    Stats(Handle<RunningStats>),
}

impl Writer {
    fn open(booked: &Booked, worker: usize) -> StoreResult<Self> {
        let slot = worker % booked.entry.key().instance_count;
        Ok(match booked.kind {
            AggregateKind::Counter => Writer::Counter(booked.entry.handle(slot)?),
            AggregateKind::Histogram => {
                Writer::Histogram(booked.entry.handle(slot)?, booked.axes.clone())
            }
            AggregateKind::Stats => Writer::Stats(booked.entry.handle(slot)?),
        })
    }

    fn fill_one(&self, rng: &mut StdRng) -> StoreResult<()> {
        match self {
            Writer::Counter(h) => h.fill(1),
            Writer::Histogram(h, axes) => {
                let mut coords = [0.0; 3];
                for (c, axis) in coords.iter_mut().zip(axes) {
                    // A margin on both sides exercises the flow cells.
                    let span = axis.max() - axis.min();
                    *c = axis.min() + span * rng.gen_range(-0.05..1.05);
                }
                h.fill(HistPoint {
                    coords,
                    weight: 1.0,
                })
            }
            Writer::Stats(h) => h.fill(rng.gen_range(0.0..100.0)),
        }
    }
}

/// Fill every booked entry from `workers` scoped threads, `events` each.
///
/// Worker `w` writes to instance slot `w % instances` with its own RNG
/// seeded from `seed + w`. Buffered handles flush when the workers finish.
pub fn fill_synthetic(
    booked: &[Booked],
    workers: usize,
    events: usize,
    seed: u64,
) -> anyhow::Result<()> {
    thread::scope(|scope| -> anyhow::Result<()> {
        let tasks: Vec<_> = (0..workers)
            .map(|worker| {
                scope.spawn(move || -> StoreResult<()> {
                    let writers = booked
                        .iter()
                        .map(|b| Writer::open(b, worker))
                        .collect::<StoreResult<Vec<_>>>()?;
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(worker as u64));
                    for _ in 0..events {
                        for writer in &writers {
                            writer.fill_one(&mut rng)?;
                        }
                    }
                    debug!(worker, events, "worker finished");
                    Ok(())
                })
            })
            .collect();
        // Join every worker before reporting, so the first error is not
        // masked by a later worker's panic.
        let mut first_error = None;
        for task in tasks {
            let outcome = match task.join() {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(_) => Err(anyhow::anyhow!("worker thread panicked")),
            };
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    })
}

fn print_entries(booked: &[Booked]) {
    for b in booked {
        let key = b.entry.key();
        let export = if key.store_on_exit {
            "store_on_exit".green()
        } else {
            "transient".dimmed()
        };
        println!(
            "  {} {} [{}, {} x{}] {}",
            key.id.to_string().dimmed(),
            key.full_name().bold(),
            key.type_tag.short_name().cyan(),
            key.layout.as_str().yellow(),
            key.instance_count,
            export
        );
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let config = RunConfig::load(&args.config)?;
    let workers = args.workers.max(1);
    let mut store = BookStore::with_config(config.store.clone());
    let booked = book_all(&mut store, &config, workers)?;
    info!(entries = booked.len(), workers, events = args.events, "starting run");

    fill_synthetic(&booked, workers, args.events, args.seed)?;

    println!(
        "{} Filled {} entries from {} workers",
        "✓".green().bold(),
        booked.len(),
        workers
    );
    for b in &booked {
        let value = b.entry.merged_json()?;
        println!("  {} = {}", b.entry.key().full_name().bold(), summarize(&value));
    }

    let format = match args.format {
        OutputFormat::Json => ExportFormat::Json,
        OutputFormat::Bincode => ExportFormat::Bincode,
    };
    let mut exporter = DirectoryExporter::new(&args.out, format);
    let report = export_on_exit(&store, &mut exporter)
        .with_context(|| format!("exporting to {}", args.out.display()))?;
    println!(
        "{} Exported {} entries to {} ({} skipped)",
        "✓".green().bold(),
        report.exported,
        args.out.display().to_string().bold(),
        report.skipped
    );
    Ok(())
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let config = RunConfig::load(&args.config)?;
    let mut store = BookStore::with_config(config.store.clone());
    let booked = book_all(&mut store, &config, 1)?;
    println!(
        "{} {} books {} entries",
        "✓".green().bold(),
        args.config.display(),
        booked.len()
    );
    print_entries(&booked);
    Ok(())
}

/// Short rendering of a merged value: scalars verbatim, objects by their
/// scalar fields.
fn summarize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(fields) => fields
            .iter()
            .filter(|(_, v)| !v.is_array() && !v.is_object())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
