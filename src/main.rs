use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use nour_classroom::gemini::types::LiveSetup;
use nour_classroom::gemini::{LiveEvent, LiveSession, WsTransport};
use nour_classroom::prompt::LIVE_SYSTEM_INSTRUCTION;
use nour_classroom::voice::{
    AudioBuffer, AudioCapture, AudioPlayback, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE,
    PlaybackScheduler, samples_to_wav,
};
use nour_classroom::{
    CURRICULUM, CaptureState, Classroom, Config, ExamProgress, GeminiClient, LiveClassroom,
    Microphone, SkillType, TeachingMode, View,
};

/// Nour - voice-first English tutor for Primary 6
#[derive(Parser)]
#[command(name = "nour", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List curriculum units and lessons
    Units,
    /// Take a generated lesson
    Lesson {
        /// Unit number
        #[arg(short, long)]
        unit: u32,
        /// Lesson number within the unit
        #[arg(short, long)]
        lesson: u32,
        /// Teaching mode (arabic or english)
        #[arg(short, long)]
        mode: Option<TeachingMode>,
        /// Do not speak the steps
        #[arg(long)]
        mute: bool,
    },
    /// Take a unit exam
    Exam {
        /// Unit number
        #[arg(short, long)]
        unit: u32,

        /// Don't read listening questions aloud
        #[arg(long)]
        mute: bool,
    },
    /// Talk to Miss Nour live through the microphone
    Live,
    /// Speak text with the tutor's voice
    Say {
        /// Text to speak
        text: String,
        /// Write a WAV file instead of playing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,nour_classroom=info",
        1 => "info,nour_classroom=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Units => {
            list_units();
            Ok(())
        }
        Command::Lesson {
            unit,
            lesson,
            mode,
            mute,
        } => cmd_lesson(&config, unit, lesson, mode, mute).await,
        Command::Exam { unit, mute } => cmd_exam(&config, unit, mute).await,
        Command::Live => cmd_live(&config).await,
        Command::Say { text, output } => cmd_say(&config, &text, output).await,
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::TestSpeaker => test_speaker().await,
    }
}

fn list_units() {
    for unit in CURRICULUM {
        println!("Unit {}: {} ({})", unit.id, unit.title, unit.language);
        for lesson in unit.lessons {
            println!("  {}. {}", lesson.id, lesson.title);
        }
    }
}

/// Read one trimmed line after showing `prompt`; `None` at end of input
async fn ask(input: &mut Lines<BufReader<Stdin>>, prompt: &str) -> anyhow::Result<Option<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|l| l.trim().to_string()))
}

/// Speak the current step on a scheduler of its own
#[allow(clippy::future_not_send)]
async fn narrate<F>(speech: F, playback: Option<&AudioPlayback>, barge_in: bool)
where
    F: Future<Output = nour_classroom::Result<Option<AudioBuffer>>>,
{
    let Some(playback) = playback else {
        return;
    };

    match speech.await {
        Ok(Some(buffer)) => {
            let duration = Duration::from_secs_f64(buffer.duration());
            let mut scheduler = PlaybackScheduler::new(playback.handle(), barge_in);
            scheduler.enqueue(buffer);
            if let Err(e) = playback.wait_idle(duration + Duration::from_secs(1)).await {
                tracing::warn!(error = %e, "narration did not finish");
            }
        }
        Ok(None) => tracing::debug!("nothing to narrate"),
        Err(e) => tracing::warn!(error = %e, "narration failed"),
    }
}

#[allow(clippy::future_not_send)]
async fn cmd_lesson(
    config: &Config,
    unit: u32,
    lesson: u32,
    mode: Option<TeachingMode>,
    mute: bool,
) -> anyhow::Result<()> {
    let client = GeminiClient::new(config)?;
    let mut classroom = Classroom::new(client, mode.unwrap_or(config.teaching_mode));

    let playback = if mute {
        None
    } else {
        AudioPlayback::new()
            .inspect_err(|e| tracing::warn!(error = %e, "no speaker, continuing silently"))
            .ok()
    };

    classroom.select_unit(unit)?;
    println!("Preparing lesson {lesson} of unit {unit}...");
    classroom.start_lesson(lesson).await?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match classroom.view().clone() {
            View::Teaching { step } => {
                if let Some(current) = classroom.current_step() {
                    println!(
                        "\n[{}/{}] {:?}",
                        step + 1,
                        classroom.script().len(),
                        current.kind
                    );
                    println!("{}", current.content);
                    println!("> {}", current.instruction);
                }
                narrate(
                    classroom.narrate_current_step(),
                    playback.as_ref(),
                    config.voice.barge_in,
                )
                .await;

                match ask(&mut input, "[enter] next, [p]revious, [q]uit: ")
                    .await?
                    .as_deref()
                {
                    None | Some("q") => classroom.back(),
                    Some("p") => classroom.previous_step()?,
                    Some(_) => classroom.next_step().await?,
                }
            }
            View::Summary => {
                if let Some(summary) = classroom.summary() {
                    println!("\nWell done!");
                    println!("Words: {}", summary.vocabulary_learned.join(", "));
                    println!("At home: {}", summary.home_activity);
                    println!("{}", summary.encouragement);
                }
                classroom.back();
            }
            View::Failed { message, .. } => {
                println!("\nSomething went wrong: {message}");
                match ask(&mut input, "[r]etry or [q]uit: ").await?.as_deref() {
                    Some("r") => classroom.retry().await?,
                    _ => classroom.back(),
                }
            }
            _ => return Ok(()),
        }
    }
}

#[allow(clippy::future_not_send)]
async fn cmd_exam(config: &Config, unit: u32, mute: bool) -> anyhow::Result<()> {
    let client = GeminiClient::new(config)?;
    let mut classroom = Classroom::new(client, config.teaching_mode);

    let playback = if mute {
        None
    } else {
        AudioPlayback::new()
            .inspect_err(|e| tracing::warn!(error = %e, "no speaker, listening questions are silent"))
            .ok()
    };

    classroom.select_unit(unit)?;
    println!("Preparing the unit {unit} exam...");
    classroom.start_exam().await?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match classroom.view().clone() {
            View::Examining { index } => {
                if let Some(question) = classroom.current_question() {
                    println!(
                        "\n[{}/{}] {:?}",
                        index + 1,
                        classroom.exam().len(),
                        question.skill
                    );
                    println!("{}", question.question);
                    println!("> {}", question.instruction);

                    if question.skill == SkillType::Listening {
                        narrate(
                            classroom.narrate_current_question(),
                            playback.as_ref(),
                            config.voice.barge_in,
                        )
                        .await;
                    }
                }

                let Some(answer) = ask(&mut input, "Your answer: ").await? else {
                    classroom.back();
                    continue;
                };
                if let ExamProgress::Finished(report) = classroom.submit_answer(&answer)? {
                    println!(
                        "\nExam finished: {} answered, {} of {} graded answers correct",
                        report.answered, report.correct, report.graded
                    );
                    return Ok(());
                }
            }
            View::Failed { message, .. } => {
                println!("\nSomething went wrong: {message}");
                match ask(&mut input, "[r]etry or [q]uit: ").await?.as_deref() {
                    Some("r") => classroom.retry().await?,
                    _ => classroom.back(),
                }
            }
            _ => return Ok(()),
        }
    }
}

#[allow(clippy::future_not_send)]
async fn cmd_live(config: &Config) -> anyhow::Result<()> {
    let transport = WsTransport::new(config)?;
    let setup = LiveSetup::audio(
        &config.models.live,
        &config.voice.voice_name,
        LIVE_SYSTEM_INSTRUCTION,
    );
    let session = LiveSession::new(
        Arc::new(transport),
        setup,
        config.voice.outbound_queue_capacity,
    );

    let playback = AudioPlayback::new()?;
    let microphone = Microphone::new(INPUT_SAMPLE_RATE, config.voice.capture_block_size);
    let mut live = LiveClassroom::new(session, playback.handle(), microphone, config.voice.barge_in)?;

    println!("Connecting to Miss Nour... (Ctrl+C to stop)");
    live.start()?;

    loop {
        tokio::select! {
            event = live.next_event() => match event {
                Some(LiveEvent::Opened) => {
                    if let CaptureState::Unavailable(reason) = live.capture_state() {
                        println!("Microphone unavailable ({reason}); you can still listen.");
                    } else {
                        println!("Connected. Say hello!");
                    }
                }
                Some(LiveEvent::Closed { reason }) => {
                    println!("Session ended: {reason:?}");
                    break;
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                live.close();
            }
        }
    }

    live.closed().await;
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn cmd_say(config: &Config, text: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let client = GeminiClient::new(config)?;

    println!("Synthesizing speech...");
    let Some(buffer) = client.synthesize(text).await? else {
        anyhow::bail!("speech synthesis returned no audio");
    };
    println!(
        "Got {:.1}s of audio at {} Hz",
        buffer.duration(),
        buffer.sample_rate()
    );

    if let Some(path) = output {
        let wav = samples_to_wav(&buffer.to_mono(), buffer.sample_rate())?;
        std::fs::write(&path, wav)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let playback = AudioPlayback::with_sample_rate(buffer.sample_rate())?;
    playback.play(buffer).await?;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut capture = AudioCapture::new(INPUT_SAMPLE_RATE, config.voice.capture_block_size)?;
    capture.start(move |frame| {
        let _ = tx.send(frame.samples);
    })?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            samples.extend(frame);
        }
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("Frames arrive every {} samples, so quiet seconds may show nothing.", config.voice.capture_block_size);

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let frequency = 440.0_f32;
    let num_samples = OUTPUT_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / OUTPUT_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {num_samples} samples at {OUTPUT_SAMPLE_RATE} Hz...");
    playback
        .play(AudioBuffer::mono(samples, OUTPUT_SAMPLE_RATE))
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
