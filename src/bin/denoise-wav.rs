//! Offline noise suppression for WAV files.
//!
//! Usage: denoise-wav <input.wav> <output.wav>
//!
//! Reads a 16 kHz mono WAV, runs the full hop-cycle pipeline over it, and
//! writes the enhanced audio with the same sample format. Model paths come
//! from `dtln-stream.toml` or the `DTLN_STREAM_*` environment variables.

use dtln_stream::defaults::BLOCK_SHIFT;
use dtln_stream::inference::load_engine;
use dtln_stream::processor::EnhancementProcessor;
use dtln_stream::{PipelineConfig, version_string};
use std::env;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("denoise-wav {}", version_string());
        eprintln!("Usage: {} <input.wav> <output.wav>", args[0]);
        process::exit(2);
    }

    if let Err(e) = run(&args[1], &args[2]) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(input: &str, output: &str) -> anyhow::Result<()> {
    let config = PipelineConfig::load_or_default(Path::new("dtln-stream.toml"))?
        .with_env_overrides();

    let mut reader = hound::WavReader::open(input)?;
    let spec = reader.spec();
    if spec.channels != 1 {
        anyhow::bail!("expected mono input, got {} channels", spec.channels);
    }
    if spec.sample_rate != config.models.sample_rate {
        anyhow::bail!(
            "expected {} Hz input, got {} Hz (resample first)",
            config.models.sample_rate,
            spec.sample_rate
        );
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    eprintln!(
        "Loaded {} samples ({:.2}s), loading models...",
        samples.len(),
        samples.len() as f32 / spec.sample_rate as f32
    );

    let engine = load_engine(&config.models)?;
    let mut processor = EnhancementProcessor::with_engine(engine);

    let mut enhanced = Vec::with_capacity(samples.len());
    for chunk in samples.chunks(BLOCK_SHIFT) {
        enhanced.extend(processor.process_chunk(chunk));
    }

    let mut writer = hound::WavWriter::create(output, spec)?;
    match spec.sample_format {
        hound::SampleFormat::Float => {
            for &sample in &enhanced {
                writer.write_sample(sample)?;
            }
        }
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            let max = scale - 1.0;
            for &sample in &enhanced {
                writer.write_sample((sample * scale).clamp(-scale, max) as i32)?;
            }
        }
    }
    writer.finalize()?;

    eprintln!("Wrote {} samples to {}", enhanced.len(), output);
    Ok(())
}
