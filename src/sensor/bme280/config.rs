use std::time::Duration;

/// 过采样倍数
///
/// 寄存器编码: 0=跳过, 1=x1, 2=x2, 3=x4, 4=x8, 5=x16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversampling {
    /// 跳过该项测量，输出寄存器保持复位值
    Skipped = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    /// 寄存器编码
    pub fn register_value(self) -> u8 {
        self as u8
    }
}

/// 工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 休眠模式，不进行测量
    Sleep = 0,
    /// 强制模式，测量一次后回到休眠
    Forced = 1,
    /// 正常模式，按待机时间循环测量
    Normal = 3,
}

impl Mode {
    pub fn register_value(self) -> u8 {
        self as u8
    }
}

/// IIR滤波器系数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

impl Filter {
    pub fn register_value(self) -> u8 {
        self as u8
    }
}

/// 正常模式下两次测量之间的待机时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standby {
    Micros500 = 0,
    Micros62500 = 1,
    Millis125 = 2,
    Millis250 = 3,
    Millis500 = 4,
    Millis1000 = 5,
    Millis10 = 6,
    Millis20 = 7,
}

impl Standby {
    pub fn register_value(self) -> u8 {
        self as u8
    }
}

/// BME280采样配置
///
/// 默认值:
/// - 温度x2、压力x16、湿度x1过采样
/// - 正常模式，待机0.5ms
/// - IIR滤波器系数4
/// - 每20ms采集一次(50Hz)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) temperature_oversampling: Oversampling,
    pub(crate) pressure_oversampling: Oversampling,
    pub(crate) humidity_oversampling: Oversampling,
    pub(crate) mode: Mode,
    pub(crate) filter: Filter,
    pub(crate) standby: Standby,
    pub(crate) period: Duration,
    pub(crate) skip_warn_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temperature_oversampling: Oversampling::X2,
            pressure_oversampling: Oversampling::X16,
            humidity_oversampling: Oversampling::X1,
            mode: Mode::Normal,
            filter: Filter::X4,
            standby: Standby::Micros500,
            period: Duration::from_millis(20),
            skip_warn_threshold: 50,
        }
    }
}

impl Config {
    pub fn temperature_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.temperature_oversampling = oversampling;

        self
    }

    pub fn pressure_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.pressure_oversampling = oversampling;

        self
    }

    /// 设为`Skipped`时湿度输出为NaN
    pub fn humidity_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.humidity_oversampling = oversampling;

        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;

        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;

        self
    }

    pub fn standby(mut self, standby: Standby) -> Self {
        self.standby = standby;

        self
    }

    /// 定时采集周期
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;

        self
    }

    /// 连续多少个周期没有产生样本时输出一次警告，0表示不警告
    pub fn skip_warn_threshold(mut self, cycles: u32) -> Self {
        self.skip_warn_threshold = cycles;

        self
    }

    /// 湿度过采样不为`Skipped`时芯片才测量湿度
    pub fn humidity_enabled(&self) -> bool {
        self.humidity_oversampling != Oversampling::Skipped
    }

    /// ctrl_meas(0xF4): osrs_t[7:5] | osrs_p[4:2] | mode[1:0]
    pub fn ctrl_meas_value(&self) -> u8 {
        (self.temperature_oversampling.register_value() << 5)
            | (self.pressure_oversampling.register_value() << 2)
            | self.mode.register_value()
    }

    /// ctrl_hum(0xF2): osrs_h[2:0]
    pub fn ctrl_hum_value(&self) -> u8 {
        self.humidity_oversampling.register_value()
    }

    /// config(0xF5): t_sb[7:5] | filter[4:2]，SPI三线模式位保持为0
    pub fn config_value(&self) -> u8 {
        (self.standby.register_value() << 5) | (self.filter.register_value() << 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_firmware_constants() {
        let config = Config::default();
        // (OVERSAMPLING_T=2 << 5) | (OVERSAMPLING_P=5 << 2) | MODE_NORMAL=3
        assert_eq!(config.ctrl_meas_value(), (2 << 5) | (5 << 2) | 3);
        // FILTER_COEFFICIENT=2 << 2
        assert_eq!(config.config_value(), 2 << 2);
        assert_eq!(config.ctrl_hum_value(), 1);
        assert_eq!(config.period, Duration::from_millis(20));
        assert!(config.humidity_enabled());
    }

    #[test]
    fn builder_sets_every_field() {
        let config = Config::default()
            .temperature_oversampling(Oversampling::X1)
            .pressure_oversampling(Oversampling::X4)
            .humidity_oversampling(Oversampling::Skipped)
            .mode(Mode::Forced)
            .filter(Filter::X16)
            .standby(Standby::Millis20)
            .period(Duration::from_secs(1));

        assert_eq!(config.ctrl_meas_value(), 0b001_011_01);
        assert_eq!(config.ctrl_hum_value(), 0);
        assert_eq!(config.config_value(), 0b111_100_00);
        assert_eq!(config.period, Duration::from_secs(1));
        assert!(!config.humidity_enabled());
    }
}
