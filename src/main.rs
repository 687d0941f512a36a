//! Console driver: plays scripted movements through the full pipeline
//! without a camera or models.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use elder_exergame::exercise::ExerciseMode;
use elder_exergame::game::Transition;
use elder_exergame::pose::synthetic::{Expression, Posture, RepTiming, ScriptedSource, Segment, SyntheticDetector};
use elder_exergame::{Command, Config, Session, SessionError, Step};

const CONFIG_PATH: &str = "config.toml";

type ConsoleSession = Session<ScriptedSource, SyntheticDetector>;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load_or_default(CONFIG_PATH);
    let source = ScriptedSource::new(config.app.target_fps.max(1));
    let detector = match &config.models.face {
        Some(_) => SyntheticDetector::with_face(),
        None => SyntheticDetector::without_face(),
    };
    let mut session = Session::new(&config, source, detector)?;

    println!("=== Elder Exergame ({}) - console ===", env!("GIT_VERSION"));
    println!();
    println!("コマンド:");
    println!("  1 / 2 / 3        - モード選択 (腕上げ / 体側伸ばし / 椅子スクワット)");
    println!("  rep [n] [peak]   - 現在のモードで n 回反復 (peak: 0.0-1.0)");
    println!("  idle [sec]       - 立ったまま待つ");
    println!("  away [sec]       - カメラの前から離れる");
    println!("  face <表情>      - neutral / smile / grimace / gasp / focus / none");
    println!("  r                - リスタート");
    println!("  s                - 現在の状態");
    println!("  q                - 終了");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "1" => command(&mut session, Command::SelectMode(ExerciseMode::ArmRaise))?,
            "2" => command(&mut session, Command::SelectMode(ExerciseMode::SideStretch))?,
            "3" => command(&mut session, Command::SelectMode(ExerciseMode::ChairSquat))?,
            "r" => command(&mut session, Command::Restart)?,
            "rep" => {
                let n: usize = parts.get(1).map_or(Ok(1), |v| v.parse())?;
                let peak: f32 = parts.get(2).map_or(Ok(1.0), |v| v.parse())?;
                let mode = session.game().active_mode;
                for _ in 0..n {
                    session.source_mut().extend(Segment::rep(mode, peak, RepTiming::default()));
                }
                play(&mut session, None)?;
            }
            "idle" | "away" => {
                let duration = match parse_seconds(parts.get(1).copied()) {
                    Ok(duration) => duration,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let segment = if parts[0] == "idle" {
                    Segment::hold(Posture::STANDING, duration)
                } else {
                    Segment::Absent { duration }
                };
                session.source_mut().push(segment);
                play(&mut session, None)?;
            }
            "face" => {
                let expression = match parts.get(1).copied() {
                    Some("neutral") => Some(Expression::Neutral),
                    Some("smile") => Some(Expression::Smile),
                    Some("grimace") => Some(Expression::Grimace),
                    Some("gasp") => Some(Expression::Gasp),
                    Some("focus") => Some(Expression::Concentrating),
                    Some("none") => None,
                    other => {
                        println!("不明な表情: {:?}", other);
                        continue;
                    }
                };
                session.source_mut().set_expression(expression);
                println!("表情: {:?}", expression);
            }
            "s" => print_status(&session),
            "q" => break,
            other => println!("不明なコマンド: {}", other),
        }
    }

    let summary = session.summary();
    println!("終了します");
    println!(
        "  {} フレーム / {:.1} 秒 / 反復 {} 回 / 勝ち {} 負け {}",
        summary.frames,
        summary.duration.as_secs_f32(),
        summary.stats.total_reps(),
        summary.stats.wins,
        summary.stats.losses
    );
    Ok(())
}

/// コマンドを1フレーム分の静止と一緒に適用
fn command(session: &mut ConsoleSession, command: Command) -> Result<()> {
    let interval = session.source_mut().frame_interval();
    session.source_mut().push(Segment::hold(Posture::STANDING, interval));
    play(session, Some(command))
}

/// 台本が尽きるまでフレームを処理し、起きたことを表示
fn play(session: &mut ConsoleSession, mut command: Option<Command>) -> Result<()> {
    while session.source_mut().remaining() > Duration::ZERO {
        let snapshot = match session.step(command.take()) {
            Ok(Step::Frame { snapshot, .. }) => snapshot,
            Ok(Step::Stopped) | Err(SessionError::CaptureEnded) => break,
            Err(e) => return Err(e.into()),
        };

        if let Some(event) = &snapshot.event {
            println!("  [{:6.2}s] {} 反復 (強さ {:.2})", event.timestamp.as_secs_f32(), event.mode, event.magnitude);
        }
        for transition in &snapshot.transitions {
            match transition {
                Transition::Ignored => {}
                other => println!("  [{:6.2}s] {:?}", snapshot.timestamp.as_secs_f32(), other),
            }
        }
        if let Some(advisory) = &snapshot.issued {
            println!("  [{:6.2}s] ({}) {}", advisory.issued_at.as_secs_f32(), advisory.urgency, advisory.message);
        }
    }
    print_status(session);
    Ok(())
}

/// 秒数の引数（省略時 3 秒）。負・NaN・無限大は拒否
fn parse_seconds(arg: Option<&str>) -> Result<Duration> {
    let secs: f32 = match arg {
        Some(v) => v.parse().with_context(|| format!("不正な秒数: {}", v))?,
        None => 3.0,
    };
    Duration::try_from_secs_f32(secs).with_context(|| format!("不正な秒数: {}", secs))
}

fn print_status(session: &ConsoleSession) {
    let game = session.game();
    let mood = session.mood();
    println!(
        "  モード: {} | HP: あなた {} / 相手 {} | {:?} | 気分: {} ({:.2})",
        game.active_mode, game.player_hp, game.opponent_hp, game.status, mood.mood, mood.confidence
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds(None).unwrap(), Duration::from_secs(3));
        assert_eq!(parse_seconds(Some("1.5")).unwrap(), Duration::from_millis(1500));
        assert!(parse_seconds(Some("inf")).is_err());
        assert!(parse_seconds(Some("NaN")).is_err());
        assert!(parse_seconds(Some("-2")).is_err());
        assert!(parse_seconds(Some("abc")).is_err());
    }
}
