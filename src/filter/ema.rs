/// EMAベースのスカラー平滑化
///
/// `new` は初回値をそのまま通す。`with_initial` は指定値から立ち上がる。
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f32,
    initial: Option<f32>,
    prev: Option<f32>,
}

impl Ema {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            initial: None,
            prev: None,
        }
    }

    pub fn with_initial(alpha: f32, initial: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            initial: Some(initial),
            prev: Some(initial),
        }
    }

    pub fn apply(&mut self, value: f32) -> f32 {
        let result = match self.prev {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.prev = Some(result);
        result
    }

    /// 入力なしで値を減衰させる（factor は 0.0〜1.0）
    pub fn decay(&mut self, factor: f32) -> f32 {
        let decayed = self.prev.unwrap_or(0.0) * factor.clamp(0.0, 1.0);
        self.prev = Some(decayed);
        decayed
    }

    pub fn value(&self) -> f32 {
        self.prev.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.prev = self.initial;
    }
}
