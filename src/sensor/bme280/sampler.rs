use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use log::{debug, trace, warn};

use super::REG_DATA;
use super::calibration::Calibration;
use super::config::Config;
use super::compensation::{self, DATA_LEN, FineTemperature, RawSample};
use crate::bus::{Device, SharedDevice};

/// 补偿后的一组测量值
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Reading {
    /// 气压(Pa)
    pub pressure: f32,
    /// 温度(°C)
    pub temperature: f32,
    /// 相对湿度(%RH)
    pub humidity: f32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    reading: Reading,
    /// 是否有尚未被取走的新样本
    has_sample: bool,
}

/// 采集线程与读取方之间共享的样本缓冲
///
/// 三个测量值总是在同一次加锁中整体写入、整体取走
#[derive(Debug, Default)]
pub struct SharedSample {
    slot: Mutex<Slot>,
    consecutive_skips: AtomicU32,
}

impl SharedSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// 缓冲里的数据都是`Copy`值并且一次赋值写完，锁中毒后照常使用
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 写入一组新样本并标记为可取（阻塞加锁）
    pub fn publish(&self, reading: Reading) {
        let mut slot = self.lock();
        slot.reading = reading;
        slot.has_sample = true;
    }

    /// 非阻塞地取走新样本
    ///
    /// 锁被占用或没有新样本时返回`None`，不会等待采集方
    pub fn try_take(&self) -> Option<Reading> {
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if !slot.has_sample {
            return None;
        }
        slot.has_sample = false;

        // OK
        Some(slot.reading)
    }

    /// 是否有尚未被取走的新样本
    pub fn has_sample(&self) -> bool {
        self.lock().has_sample
    }

    /// 连续没有产生样本的采集周期数
    pub fn consecutive_skips(&self) -> u32 {
        self.consecutive_skips.load(Ordering::Relaxed)
    }
}

/// 定时采集器，由调度器周期调用[`Sampler::run_cycle`]
pub struct Sampler<D> {
    device: SharedDevice<D>,
    calib: Calibration,
    /// 本周期温度补偿得到的 t_fine，压力和湿度补偿依赖它
    t_fine: FineTemperature,
    shared: Arc<SharedSample>,
    skip_warn_threshold: u32,
    /// 湿度测量关闭时芯片固定报告 0x8000，不做补偿
    humidity_enabled: bool,
}

impl<D> Sampler<D>
where
    D: Device,
{
    pub fn new(
        device: SharedDevice<D>,
        calib: Calibration,
        shared: Arc<SharedSample>,
        config: &Config,
    ) -> Self {
        Self {
            device,
            calib,
            t_fine: FineTemperature::default(),
            shared,
            skip_warn_threshold: config.skip_warn_threshold,
            humidity_enabled: config.humidity_enabled(),
        }
    }

    /// 最近一次温度补偿得到的 t_fine
    pub fn fine_temperature(&self) -> FineTemperature {
        self.t_fine
    }

    /// 执行一个采集周期，发布了新样本时返回`true`
    ///
    /// 总线读取失败或压力补偿无法进行时本周期不发布任何数据，
    /// 之前发布的样本保持不变，下个周期重新尝试
    pub fn run_cycle(&mut self) -> bool {
        let raw = match self.read_raw() {
            Ok(raw) => raw,
            Err(err) => {
                self.record_skip(format_args!("读取原始数据失败: {:#}", err));
                return false;
            }
        };
        trace!("原始数据: {:?}", raw);

        // 温度必须最先计算，它更新 t_fine
        let temperature = self.update_temperature(raw.temperature);
        let Some(pressure) = self.update_pressure(raw.pressure) else {
            self.record_skip(format_args!("压力补偿除数为0, t_fine={}", self.t_fine.0));
            return false;
        };
        let humidity = self.update_humidity(raw.humidity);

        self.shared.publish(Reading {
            pressure,
            temperature,
            humidity,
        });
        self.shared.consecutive_skips.store(0, Ordering::Relaxed);

        // OK
        true
    }

    /// 读取 0xF7 开始的 8 字节原始数据
    fn read_raw(&self) -> anyhow::Result<RawSample> {
        // 声明缓冲区
        let mut data = [0u8; DATA_LEN];

        // 确保最小作用域
        {
            // 获取总线通信权限
            let mut device = self
                .device
                .lock()
                .map_err(|err| anyhow::anyhow!("通信总线锁已失效: {}", err))?;

            device.read_registers(REG_DATA, &mut data)?;
        }

        // OK
        Ok(RawSample::decode(&data))
    }

    fn update_temperature(&mut self, adc_t: i32) -> f32 {
        let (t_fine, temperature) = compensation::compensate_temperature(&self.calib, adc_t);
        self.t_fine = t_fine;
        temperature
    }

    fn update_pressure(&self, adc_p: i32) -> Option<f32> {
        compensation::compensate_pressure(&self.calib, adc_p, self.t_fine)
    }

    fn update_humidity(&self, adc_h: i32) -> f32 {
        if !self.humidity_enabled {
            return f32::NAN;
        }
        compensation::compensate_humidity(&self.calib, adc_h, self.t_fine)
    }

    fn record_skip(&self, reason: std::fmt::Arguments<'_>) {
        let skips = self.shared.consecutive_skips.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("跳过本次采集({}): {}", skips, reason);

        if skips == self.skip_warn_threshold {
            warn!("BME280已连续{}个周期没有产生样本: {}", skips, reason);
        }
    }
}
