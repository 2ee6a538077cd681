//! 寄存器总线抽象
//!
//! 驱动只依赖 [`Device`]：按寄存器地址读写字节。总线互斥由 [`SharedDevice`]
//! 负责，阻塞获取用 `lock()`，立即返回用 `try_lock()`。

use std::sync::{Arc, Mutex};

mod i2c;
mod spi;

pub use i2c::I2cDevice;
pub use spi::SpiDevice;

/// 总线类型
///
/// SPI 写操作需要清除寄存器地址最高位，驱动据此选择地址掩码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    I2c,
    Spi,
}

/// 总线速率档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSpeed {
    Low,
    High,
}

/// 寄存器级总线设备
pub trait Device: Send {
    /// 总线类型
    fn bus_type(&self) -> BusType;

    /// 从`reg`开始连续读取`buf.len()`个字节
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> anyhow::Result<()>;

    /// 向`reg`写入一个字节
    fn write_register(&mut self, reg: u8, value: u8) -> anyhow::Result<()>;

    /// 切换总线速率
    ///
    /// 默认不做任何事，速率由总线控制器自身决定
    fn set_speed(&mut self, _speed: BusSpeed) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 带互斥锁的共享总线设备
pub type SharedDevice<D> = Arc<Mutex<D>>;

/// 包装成共享总线设备
pub fn share<D: Device>(device: D) -> SharedDevice<D> {
    Arc::new(Mutex::new(device))
}
