use anyhow::Result;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;
use std::sync::mpsc::Sender;

use crate::exercise::{signal, ExerciseMode};
use crate::game::GameState;
use crate::mood::Mood;
use crate::pose::source::CapturedFrame;
use crate::pose::Pose;
use crate::safety::Advisory;
use crate::session::{Command, RenderSink, Snapshot};

use super::hud::{
    bar_fill, hp_color, mood_color, status_line, urgency_color, visible_advisory, ACTIVE_SKELETON_COLOR,
    BAR_BACKGROUND, KEYPOINT_COLOR, LOW_CONFIDENCE_COLOR, SKELETON_COLOR,
};
use super::skeleton::{is_highlighted, SKELETON_CONNECTIONS};

const BAR_HEIGHT: usize = 18;
const MARGIN: usize = 12;
const BANNER_HEIGHT: usize = 28;

/// minifbを使用したレンダラー
///
/// キー入力は `Command` として送信する（1/2/3: モード、R: リスタート、Q/Esc: 終了）。
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    confidence_floor: f32,
    commands: Sender<Command>,
    title: String,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize, confidence_floor: f32, commands: Sender<Command>) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
            confidence_floor,
            commands,
            title: title.to_string(),
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// BGR Mat をウィンドウサイズに拡縮してバッファにコピー（最近傍）
    fn draw_frame(&mut self, frame: &Mat) -> Result<()> {
        let frame_width = frame.cols() as usize;
        let frame_height = frame.rows() as usize;
        if frame_width == 0 || frame_height == 0 {
            self.buffer.fill(0);
            return Ok(());
        }

        for y in 0..self.height {
            let sy = y * frame_height / self.height;
            for x in 0..self.width {
                let sx = x * frame_width / self.width;
                let pixel = frame.at_2d::<Vec3b>(sy as i32, sx as i32)?;
                // BGR -> RGB -> u32
                let r = pixel[2] as u32;
                let g = pixel[1] as u32;
                let b = pixel[0] as u32;
                self.buffer[y * self.width + x] = (r << 16) | (g << 8) | b;
            }
        }

        Ok(())
    }

    /// 姿勢を描画（現在のモードで使う部位を強調）
    fn draw_pose(&mut self, pose: &Pose, mode: ExerciseMode) {
        let w = self.width as u32;
        let h = self.height as u32;
        let floor = self.confidence_floor;
        let required = signal::required_keypoints(mode);

        for &connection in SKELETON_CONNECTIONS.iter() {
            let start = pose.get(connection.0);
            let end = pose.get(connection.1);

            if start.is_valid(floor) && end.is_valid(floor) {
                let (x1, y1) = start.to_pixel(w, h);
                let (x2, y2) = end.to_pixel(w, h);
                let color = if is_highlighted(connection, required) {
                    ACTIVE_SKELETON_COLOR
                } else {
                    SKELETON_COLOR
                };
                self.draw_line(x1, y1, x2, y2, color);
            }
        }

        for kp in pose.keypoints.iter() {
            let (px, py) = kp.to_pixel(w, h);
            let color = if kp.is_valid(floor) {
                KEYPOINT_COLOR
            } else {
                LOW_CONFIDENCE_COLOR
            };
            self.draw_circle(px, py, 4, color);
        }
    }

    /// 上部に両者の HP バー（左: プレイヤー、右: 相手）
    fn draw_hp_bars(&mut self, game: &GameState) {
        let bar_width = self.width / 2 - 2 * MARGIN;
        for (hp, x0) in [(game.player_hp, MARGIN), (game.opponent_hp, self.width / 2 + MARGIN)] {
            let fraction = hp as f32 / game.max_hp.max(1) as f32;
            let fill = bar_fill(hp, game.max_hp, bar_width);
            self.fill_rect(x0, MARGIN, bar_width, BAR_HEIGHT, BAR_BACKGROUND);
            self.fill_rect(x0, MARGIN, fill, BAR_HEIGHT, hp_color(fraction));
        }
    }

    /// 気分の色チップ（バーの下、左端）
    fn draw_mood(&mut self, mood: Mood) {
        self.fill_rect(MARGIN, MARGIN * 2 + BAR_HEIGHT, BAR_HEIGHT, BAR_HEIGHT, mood_color(mood));
    }

    /// 下部の助言バナー
    fn draw_advisory(&mut self, advisory: &Advisory) {
        let y = self.height.saturating_sub(BANNER_HEIGHT);
        self.fill_rect(0, y, self.width, BANNER_HEIGHT, urgency_color(advisory.urgency));
    }

    /// 押されたキーをコマンドとして送る
    fn forward_keys(&mut self) {
        let mut commands: Vec<Command> = self
            .window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .filter_map(|key| match key {
                Key::Key1 | Key::NumPad1 => Some(Command::SelectMode(ExerciseMode::ArmRaise)),
                Key::Key2 | Key::NumPad2 => Some(Command::SelectMode(ExerciseMode::SideStretch)),
                Key::Key3 | Key::NumPad3 => Some(Command::SelectMode(ExerciseMode::ChairSquat)),
                Key::R => Some(Command::Restart),
                Key::Q | Key::Escape => Some(Command::Quit),
                _ => None,
            })
            .collect();
        if !self.window.is_open() {
            commands.push(Command::Quit);
        }
        for command in commands {
            // 受信側が先に終了していれば送れなくても構わない
            let _ = self.commands.send(command);
        }
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for py in y..(y + h).min(self.height) {
            let row = py * self.width;
            for px in x..(x + w).min(self.width) {
                self.buffer[row + px] = color;
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}

impl RenderSink<Mat> for MinifbRenderer {
    fn render(&mut self, frame: &CapturedFrame<Mat>, snapshot: &Snapshot) -> Result<()> {
        self.draw_frame(&frame.image)?;
        self.draw_pose(&snapshot.pose.pose, snapshot.game.active_mode);
        self.draw_hp_bars(&snapshot.game);
        self.draw_mood(snapshot.mood.mood);
        let advisory = visible_advisory(snapshot.advisory.as_ref(), snapshot.timestamp);
        if let Some(advisory) = advisory {
            self.draw_advisory(advisory);
        }

        let title = status_line(&snapshot.game, snapshot.mood.mood, advisory);
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        self.forward_keys();
        Ok(())
    }
}
