/// 新订单震动节奏 (毫秒: 震-停-震)
pub const ORDER_VIBRATION_PATTERN: [u64; 3] = [200, 100, 200];

/// 平台震动能力 (可选)
pub trait Haptics: Send + Sync {
    fn vibrate(&self, pattern_ms: &[u64]);
}
