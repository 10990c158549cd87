use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use eqlink_host::{EqualizerConfig, EqualizerCtl, EqualizerPcm};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = cli.config.resolve()?;
    match cli.command {
        Commands::Init => execute_init(&config),
        Commands::List => execute_list(&config),
        Commands::Get { name } => execute_get(&config, &name),
        Commands::Set { name, values } => execute_set(&config, &name, &values),
        Commands::Render(args) => execute_render(&config, args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "Inspect and drive a shared-control LADSPA equalizer")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON configuration file; the flags below override its fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// LADSPA library, absolute or searched along LADSPA_PATH.
    #[arg(long, global = true)]
    library: Option<PathBuf>,
    /// Label of the plugin inside the library.
    #[arg(long, global = true)]
    module: Option<String>,
    /// Number of audio channels.
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(1..=16))]
    channels: Option<u16>,
    /// Control file; relative paths are resolved in the home directory.
    #[arg(long, global = true)]
    controls: Option<PathBuf>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<EqualizerConfig> {
        let mut config = match &self.config {
            Some(path) => EqualizerConfig::load(path)?,
            None => EqualizerConfig::default(),
        };
        if let Some(library) = &self.library {
            config = config.with_library(library);
        }
        if let Some(module) = &self.module {
            config = config.with_module(module);
        }
        if let Some(channels) = self.channels {
            config = config.with_channels(usize::from(channels));
        }
        if let Some(controls) = &self.controls {
            config = config.with_controls(controls);
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the control file with default values if it does not exist yet.
    Init,
    /// List every control with its per-channel values on the 0-100 scale.
    List,
    /// Print the per-channel values of one control.
    Get { name: String },
    /// Set one control. A single value applies to every channel.
    Set {
        name: String,
        #[arg(required = true, value_parser = clap::value_parser!(i64).range(0..=100))]
        values: Vec<i64>,
    },
    /// Run a WAV file through the equalizer.
    Render(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output: PathBuf,
}

fn execute_init(config: &EqualizerConfig) -> Result<()> {
    let ctl = EqualizerCtl::open(config)?;
    let control = ctl.surface().control_file();
    println!(
        "{}: {} controls, {} channels, {} bytes",
        control.path().display(),
        control.num_controls(),
        control.channels(),
        control.len()
    );
    Ok(())
}

fn execute_list(config: &EqualizerConfig) -> Result<()> {
    let ctl = EqualizerCtl::open(config)?;
    let surface = ctl.surface();
    let identity = surface.identity();
    println!("{} ({})", identity.longname, identity.id);
    for (key, name) in surface.elem_list() {
        let values = surface.read_integer(key)?;
        println!("{name}: {}", format_values(&values));
    }
    Ok(())
}

fn execute_get(config: &EqualizerConfig, name: &str) -> Result<()> {
    let ctl = EqualizerCtl::open(config)?;
    match ctl.get(name)? {
        Some(values) => {
            println!("{}", format_values(&values));
            Ok(())
        }
        None => bail!("no control named \"{name}\""),
    }
}

fn execute_set(config: &EqualizerConfig, name: &str, values: &[i64]) -> Result<()> {
    let ctl = EqualizerCtl::open(config)?;
    ctl.set(name, values)?;
    ctl.surface().control_file().flush()?;
    Ok(())
}

fn execute_render(config: &EqualizerConfig, args: RenderArgs) -> Result<()> {
    let (spec, samples) = read_wav(&args.input)?;
    if usize::from(spec.channels) != config.channels {
        bail!(
            "{} has {} channels, the equalizer is configured for {}",
            args.input.display(),
            spec.channels,
            config.channels
        );
    }

    let mut pcm = EqualizerPcm::open(config)?;
    pcm.start_at(spec.sample_rate)?;
    let output = render_samples(&mut pcm, &samples)?;
    pcm.close();

    write_wav(&args.output, spec.channels, spec.sample_rate, &output)?;
    info!(
        frames = output.len() / usize::from(spec.channels),
        output = %args.output.display(),
        "render finished"
    );
    Ok(())
}

fn format_values(values: &[i64]) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Processes interleaved samples block by block.
fn render_samples(pcm: &mut EqualizerPcm, samples: &[f32]) -> Result<Vec<f32>> {
    let channels = pcm.constraints().channels;
    let frames = samples.len() / channels;
    let mut output = vec![0.0f32; frames * channels];
    pcm.transfer(&samples[..frames * channels], &mut output, frames)?;
    Ok(output)
}

/// Reads a WAV file as interleaved `f32`, converting integer formats.
fn read_wav(path: &Path) -> Result<(hound::WavSpec, Vec<f32>)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("failed to decode {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("failed to decode {}", path.display()))?
        }
    };
    Ok((spec, samples))
}

fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[f32]) -> Result<()> {
    let mut writer = hound::WavWriter::create(
        path,
        hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
    )
    .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
