use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::bus::{BusSpeed, BusType, Device, SharedDevice};
use crate::registry::SensorRegistry;
use crate::scheduler::{PeriodicHandle, Scheduler};

mod calibration;
mod compensation;
mod config;
mod sampler;

pub use calibration::{Calibration, unpack_h4_h5};
pub use compensation::{
    FineTemperature, HUMIDITY_MAX, RawSample, compensate_humidity, compensate_humidity_fixed,
    compensate_pressure, compensate_temperature,
};
pub use config::{Config, Filter, Mode, Oversampling, Standby};
pub use sampler::{Reading, Sampler, SharedSample};

/// 芯片ID
pub const BME280_ID: u8 = 0x60;

/// 芯片ID寄存器
pub const REG_ID: u8 = 0xD0;
/// 湿度过采样寄存器 ctrl_hum
pub const REG_CTRL_HUM: u8 = 0xF2;
/// 状态寄存器
pub const REG_STATUS: u8 = 0xF3;
/// 温度/压力过采样和工作模式寄存器 ctrl_meas
pub const REG_CTRL_MEAS: u8 = 0xF4;
/// 待机时间和滤波器寄存器 config
pub const REG_CONFIG: u8 = 0xF5;
/// 原始数据起始寄存器
pub const REG_DATA: u8 = 0xF7;

/// 状态寄存器 im_update 位，NVM数据正在复制到寄存器
const STATUS_IM_UPDATE: u8 = 0x01;
/// 等待NVM复制完成的最大次数
const READY_ATTEMPTS: u32 = 5;

/// BME280驱动错误
#[derive(Debug, thiserror::Error)]
pub enum Bme280Error {
    /// 初始化过程中总线读写失败
    #[error("BME280总线通信失败: {0:#}")]
    Bus(anyhow::Error),

    /// 总线互斥锁已失效
    #[error("BME280通信总线锁已失效")]
    BusPoisoned,

    /// 调度器拒绝注册定时回调
    #[error("BME280注册定时采集失败: {0:#}")]
    Scheduler(anyhow::Error),
}

/// BME280 大气压力、温度、湿度传感器封装对象
///
/// 采集在调度器的定时回调中进行，[`BME280::update`] 把最新样本搬到
/// 对外可见的读数上，不会阻塞调用方。
pub struct BME280 {
    /// 采集方与读取方共享的样本缓冲
    shared: Arc<SharedSample>,
    /// 定时采集句柄，丢弃时停止采集
    handle: PeriodicHandle,
    /// 登记处分配的实例编号
    instance: u8,
    /// 采样配置
    config: Config,
    /// 对外可见的读数
    reading: Reading,
}

/// 实现BME280传感器操作
impl BME280 {
    /// 探测并初始化BME280
    ///
    /// - `Ok(Some(_))`: 初始化完成，已开始定时采集
    /// - `Ok(None)`: 总线上不是BME280（或芯片ID读不到）
    /// - `Err(_)`: 芯片已识别，但后续初始化失败
    pub fn probe<D, S, R>(
        device: SharedDevice<D>,
        config: Config,
        scheduler: &mut S,
        registry: &R,
    ) -> Result<Option<Self>, Bme280Error>
    where
        D: Device + 'static,
        S: Scheduler,
        R: SensorRegistry,
    {
        // 持有总线期间完成识别和配置
        let calib = {
            // 获取总线通信权限
            let mut bus = device.lock().map_err(|_| Bme280Error::BusPoisoned)?;

            if let Err(err) = bus.set_speed(BusSpeed::High) {
                debug!("切换总线速率失败: {:#}", err);
            }

            if !Self::check_id(&mut *bus) {
                return Ok(None);
            }

            Self::wait_ready(&mut *bus);

            let calib = Self::read_calibration_data(&mut *bus).map_err(Bme280Error::Bus)?;
            debug!("校准参数: {:?}", calib);

            Self::configure(&mut *bus, &config).map_err(Bme280Error::Bus)?;

            calib
        };

        // 总线释放后再注册定时采集
        let shared = Arc::new(SharedSample::new());
        let mut sampler = Sampler::new(device, calib, shared.clone(), &config);
        let handle = scheduler
            .register_periodic_callback(
                config.period,
                Box::new(move || {
                    sampler.run_cycle();
                }),
            )
            .map_err(Bme280Error::Scheduler)?;

        // 定时采集注册成功后才占用实例编号
        let instance = registry.register_sensor();

        info!(
            "BME280实例{}初始化完成, 采集周期: {:?}",
            instance, config.period
        );

        // OK
        Ok(Some(Self {
            shared,
            handle,
            instance,
            config,
            reading: Reading::default(),
        }))
    }

    /// 检查芯片ID
    fn check_id<D: Device>(bus: &mut D) -> bool {
        let mut whoami = [0u8];
        match bus.read_registers(REG_ID, &mut whoami) {
            Ok(()) if whoami[0] == BME280_ID => true,
            Ok(()) => {
                debug!("芯片ID不匹配: 0x{:02X}", whoami[0]);
                false
            }
            Err(err) => {
                debug!("读取芯片ID失败: {:#}", err);
                false
            }
        }
    }

    /// 等待上电后NVM校准数据复制完成
    fn wait_ready<D: Device>(bus: &mut D) {
        let mut status = [0u8];
        for _ in 0..READY_ATTEMPTS {
            match bus.read_registers(REG_STATUS, &mut status) {
                Ok(()) if status[0] & STATUS_IM_UPDATE == 0 => return,
                Ok(()) => {}
                Err(err) => debug!("读取状态寄存器失败: {:#}", err),
            }
            thread::sleep(Duration::from_millis(1));
        }

        warn!("传感器仍在更新校准数据, 继续读取");
    }

    /// 读取校准数据
    fn read_calibration_data<D: Device>(bus: &mut D) -> anyhow::Result<Calibration> {
        // 读取温度/压力校准参数和 dig_H1 (0x88-0xA1)
        let mut calib = [0u8; calibration::CALIB_LEN];
        bus.read_registers(calibration::REG_CALIB, &mut calib)?;

        // 读取湿度校准参数 (0xE1-0xE8)
        let mut calib_hum = [0u8; calibration::CALIB_HUM_LEN];
        bus.read_registers(calibration::REG_CALIB_HUM, &mut calib_hum)?;

        // OK
        Ok(Calibration::from_registers(&calib, &calib_hum))
    }

    /// 写入采样配置
    fn configure<D: Device>(bus: &mut D, config: &Config) -> anyhow::Result<()> {
        // SPI写操作需要清除地址最高位
        let mask = match bus.bus_type() {
            BusType::Spi => 0x7F,
            BusType::I2c => 0xFF,
        };

        // ctrl_hum 在下一次写 ctrl_meas 后才生效，必须先写
        bus.write_register(REG_CTRL_HUM & mask, config.ctrl_hum_value())?;
        bus.write_register(REG_CTRL_MEAS & mask, config.ctrl_meas_value())?;
        bus.write_register(REG_CONFIG & mask, config.config_value())?;

        // OK
        Ok(())
    }

    /// 取走最新样本
    ///
    /// 从不阻塞：缓冲正被采集方占用或没有新样本时什么也不做，
    /// 之前的读数保持不变
    pub fn update(&mut self) {
        if let Some(reading) = self.shared.try_take() {
            self.reading = reading;
        }
    }

    /// 气压(Pa)
    pub fn pressure(&self) -> f32 {
        self.reading.pressure
    }

    /// 温度(°C)
    pub fn temperature(&self) -> f32 {
        self.reading.temperature
    }

    /// 相对湿度(%RH)
    pub fn humidity(&self) -> f32 {
        self.reading.humidity
    }

    /// 最近一次`update()`取到的读数
    pub fn reading(&self) -> Reading {
        self.reading
    }

    /// 登记处分配的实例编号
    pub fn instance(&self) -> u8 {
        self.instance
    }

    /// 初始化时使用的采样配置
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 连续没有产生样本的采集周期数
    pub fn consecutive_skips(&self) -> u32 {
        self.shared.consecutive_skips()
    }

    /// 停止定时采集，已取到的读数仍然可读
    pub fn stop(&mut self) {
        self.handle.stop();
    }
}
