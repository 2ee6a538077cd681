use std::sync::atomic::{AtomicU8, Ordering};

/// 传感器登记处，探测成功的驱动在这里领取实例编号
pub trait SensorRegistry {
    /// 登记一个新传感器，返回实例编号
    fn register_sensor(&self) -> u8;
}

/// 按登记顺序从0开始分配编号
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    next: AtomicU8,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已登记的传感器个数
    pub fn count(&self) -> u8 {
        self.next.load(Ordering::Relaxed)
    }
}

impl SensorRegistry for InstanceRegistry {
    fn register_sensor(&self) -> u8 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
