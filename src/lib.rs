//! 树莓派 BME280 气压/温度/湿度传感器驱动
//!
//! 后台定时回调负责采集和补偿，前台轮询通过非阻塞方式取走最新样本。

pub mod bus;
pub mod logger;
pub mod registry;
pub mod scheduler;
pub mod sensor;
pub mod std_clock;
