use super::calibration::Calibration;

/// 原始数据寄存器长度 (0xF7-0xFE)
pub const DATA_LEN: usize = 8;

/// 湿度补偿结果上限，Q22.10 格式左移12位前的 100 %RH
pub const HUMIDITY_MAX: i32 = 419_430_400;

/// 一次突发读取得到的原始ADC值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// 20位压力ADC值
    pub pressure: i32,
    /// 20位温度ADC值
    pub temperature: i32,
    /// 16位湿度ADC值
    pub humidity: i32,
}

impl RawSample {
    /// 解析 0xF7 开始的 8 字节原始数据
    ///
    /// - 压力: 0xF7[19:12] 0xF8[11:4] 0xF9[7:4]
    /// - 温度: 0xFA[19:12] 0xFB[11:4] 0xFC[7:4]
    /// - 湿度: 0xFD[15:8] 0xFE[7:0]
    pub fn decode(buf: &[u8; DATA_LEN]) -> Self {
        let pressure =
            (i32::from(buf[0]) << 12) | (i32::from(buf[1]) << 4) | (i32::from(buf[2]) >> 4);
        let temperature =
            (i32::from(buf[3]) << 12) | (i32::from(buf[4]) << 4) | (i32::from(buf[5]) >> 4);
        let humidity = (i32::from(buf[6]) << 8) | i32::from(buf[7]);

        Self {
            pressure,
            temperature,
            humidity,
        }
    }
}

/// 温度补偿的中间结果 t_fine，压力和湿度补偿都依赖它
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FineTemperature(pub i32);

/// BME280温度补偿函数
///
/// ## 功能描述
/// 按数据手册的32位定点公式，将原始 ADC 温度值转换为摄氏度，
/// 同时生成压力/湿度补偿所需的 t_fine。
///
/// ## 参数
/// - `adc_t`: 从寄存器 0xFA-0xFC 读取的原始20位温度ADC值
///
/// ## 返回
/// - `(FineTemperature, f32)`: t_fine 和补偿后的温度值(°C)
///
/// 先以整数得到 0.01°C 单位的结果，再除以100
///
/// 全部运算按32位有符号补码回绕，与参考实现一致
pub fn compensate_temperature(calib: &Calibration, adc_t: i32) -> (FineTemperature, f32) {
    let dig_t1 = i32::from(calib.dig_t1);
    let dig_t2 = i32::from(calib.dig_t2);
    let dig_t3 = i32::from(calib.dig_t3);

    // var1 = (((adc_T >> 3) - (dig_T1 << 1)) * dig_T2) >> 11
    let var1 = ((adc_t >> 3).wrapping_sub(dig_t1 << 1)).wrapping_mul(dig_t2) >> 11;
    // var2 = (((((adc_T >> 4) - dig_T1) * ((adc_T >> 4) - dig_T1)) >> 12) * dig_T3) >> 14
    let delta = (adc_t >> 4).wrapping_sub(dig_t1);
    let var2 = (delta.wrapping_mul(delta) >> 12).wrapping_mul(dig_t3) >> 14;

    let t_fine = var1.wrapping_add(var2);
    // 单位 0.01°C
    let temperature = t_fine.wrapping_mul(5).wrapping_add(128) >> 8;

    // OK
    (FineTemperature(t_fine), temperature as f32 / 100.0)
}

/// BME280 压力补偿函数
///
/// ## 功能描述
/// 按数据手册的64位定点公式，将原始 ADC 压力值转换为帕斯卡(Pa)，
/// 使用温度补偿生成的 t_fine 值。
///
/// ## 返回
/// - `Some(f32)`: 补偿后的压力值(Pa)
/// - `None`: 作为除数的中间值为0，本次无法补偿
pub fn compensate_pressure(calib: &Calibration, adc_p: i32, t_fine: FineTemperature) -> Option<f32> {
    let dig_p1 = i64::from(calib.dig_p1);
    let dig_p2 = i64::from(calib.dig_p2);
    let dig_p3 = i64::from(calib.dig_p3);
    let dig_p4 = i64::from(calib.dig_p4);
    let dig_p5 = i64::from(calib.dig_p5);
    let dig_p6 = i64::from(calib.dig_p6);
    let dig_p7 = i64::from(calib.dig_p7);
    let dig_p8 = i64::from(calib.dig_p8);
    let dig_p9 = i64::from(calib.dig_p9);

    // 步骤1: var1 = t_fine - 128000
    let mut var1 = i64::from(t_fine.0) - 128000;

    // 步骤2: 二阶补偿项
    // var2 = var1 * var1 * dig_P6 + ((var1 * dig_P5) << 17) + (dig_P4 << 35)
    let mut var2 = var1.wrapping_mul(var1).wrapping_mul(dig_p6);
    var2 = var2.wrapping_add(var1.wrapping_mul(dig_p5) << 17);
    var2 = var2.wrapping_add(dig_p4 << 35);

    // 步骤3: 主补偿项
    // var1 = ((var1 * var1 * dig_P3) >> 8) + ((var1 * dig_P2) << 12)
    // var1 = (((1 << 47) + var1) * dig_P1) >> 33
    var1 = (var1.wrapping_mul(var1).wrapping_mul(dig_p3) >> 8)
        .wrapping_add(var1.wrapping_mul(dig_p2) << 12);
    var1 = ((1_i64 << 47).wrapping_add(var1)).wrapping_mul(dig_p1) >> 33;

    // 步骤4: 除数为0时放弃本次补偿
    if var1 == 0 {
        return None;
    }

    // 步骤5: p = (((1048576 - adc_P) << 31) - var2) * 3125 / var1
    let mut p = 1048576 - i64::from(adc_p);
    p = ((p << 31).wrapping_sub(var2))
        .wrapping_mul(3125)
        .wrapping_div(var1);

    // 步骤6: 最终补偿
    // var1 = (dig_P9 * (p >> 13) * (p >> 13)) >> 25
    // var2 = (dig_P8 * p) >> 19
    // p = ((p + var1 + var2) >> 8) + (dig_P7 << 4)
    var1 = dig_p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
    var2 = dig_p8.wrapping_mul(p) >> 19;
    p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(dig_p7 << 4);

    // p 为 Q24.8 格式的帕斯卡
    Some(p as f32 / 256.0)
}

/// 湿度补偿的定点结果，已限制在 [0, 419430400]
///
/// 右移12位后为 Q22.10 格式的 %RH
pub fn compensate_humidity_fixed(calib: &Calibration, adc_h: i32, t_fine: FineTemperature) -> i32 {
    let dig_h1 = i32::from(calib.dig_h1);
    let dig_h2 = i32::from(calib.dig_h2);
    let dig_h3 = i32::from(calib.dig_h3);
    let dig_h4 = i32::from(calib.dig_h4);
    let dig_h5 = i32::from(calib.dig_h5);
    let dig_h6 = i32::from(calib.dig_h6);

    // 步骤1: 温度调整项
    let v = t_fine.0.wrapping_sub(76800);

    // 步骤2: 主补偿计算
    let x = (adc_h << 14)
        .wrapping_sub(dig_h4 << 20)
        .wrapping_sub(dig_h5.wrapping_mul(v))
        .wrapping_add(16384)
        >> 15;
    let y = (v.wrapping_mul(dig_h6) >> 10).wrapping_mul((v.wrapping_mul(dig_h3) >> 11).wrapping_add(32768))
        >> 10;
    let y = y.wrapping_add(2097152).wrapping_mul(dig_h2).wrapping_add(8192) >> 14;
    let mut v = x.wrapping_mul(y);

    // 步骤3: 非线性补偿
    v = v.wrapping_sub((((v >> 15).wrapping_mul(v >> 15) >> 7).wrapping_mul(dig_h1)) >> 4);

    // 步骤4: 先限幅，再由调用方移位缩放
    v.clamp(0, HUMIDITY_MAX)
}

/// BME280 湿度补偿函数
///
/// ## 返回
/// - `f32`: 补偿后的相对湿度(%RH)，范围 0.0-100.0
///
/// 湿度测量是否开启由调用方判断，这里对整个16位ADC范围照常计算
pub fn compensate_humidity(calib: &Calibration, adc_h: i32, t_fine: FineTemperature) -> f32 {
    let fixed = compensate_humidity_fixed(calib, adc_h, t_fine);

    // 返回相对湿度: Q22.10格式的湿度值 / 1024
    (fixed >> 12) as f32 / 1024.0
}
