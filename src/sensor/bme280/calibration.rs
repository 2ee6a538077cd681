/// 温度/压力校准区起始地址 (0x88-0xA1)
pub const REG_CALIB: u8 = 0x88;
/// 温度/压力校准区长度，含0xA1处的 dig_H1
pub const CALIB_LEN: usize = 26;
/// 湿度校准区起始地址 (0xE1-0xE8)
pub const REG_CALIB_HUM: u8 = 0xE1;
/// 湿度校准区长度
pub const CALIB_HUM_LEN: usize = 8;

/// BME280传感器校准参数结构体
///
/// 该结构体存储了从传感器 NVM 中读取的所有校准参数，用于
/// 温度、压力和湿度测量的补偿计算。初始化时读取一次，之后不再修改。
///
/// # 存储分布
/// - 温度/压力参数: 地址 0x88-0x9F (24字节, 小端序)
/// - dig_H1: 地址 0xA1 (0xA0 未使用)
/// - 其余湿度参数: 地址 0xE1-0xE7，其中 dig_H4/dig_H5 共用 0xE5 的两个半字节
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calibration {
    /// 温度校准系数 1 - 基准偏移量
    ///
    /// ## 特性
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0x88-0x89 (小端序)
    pub dig_t1: u16,

    /// 温度校准系数 2 - 一阶灵敏度系数
    /// - **地址**: 0x8A-0x8B (小端序)
    pub dig_t2: i16,

    /// 温度校准系数 3 - 二阶非线性系数
    /// - **地址**: 0x8C-0x8D (小端序)
    pub dig_t3: i16,

    /// 压力校准系数 1 - 基准缩放系数
    ///
    /// ## 特性
    /// - **类型**: 无符号 16 位整数 (u16)
    /// - **地址**: 0x8E-0x8F (小端序)
    ///
    /// 补偿公式中作为除数的来源，为0时压力补偿无法进行
    pub dig_p1: u16,

    /// 压力校准系数 2 - 0x90-0x91
    pub dig_p2: i16,
    /// 压力校准系数 3 - 0x92-0x93
    pub dig_p3: i16,
    /// 压力校准系数 4 - 0x94-0x95
    pub dig_p4: i16,
    /// 压力校准系数 5 - 0x96-0x97
    pub dig_p5: i16,
    /// 压力校准系数 6 - 0x98-0x99
    pub dig_p6: i16,
    /// 压力校准系数 7 - 0x9A-0x9B
    pub dig_p7: i16,
    /// 压力校准系数 8 - 0x9C-0x9D
    pub dig_p8: i16,
    /// 压力校准系数 9 - 0x9E-0x9F
    pub dig_p9: i16,

    /// 湿度校准系数 1 - 0xA1 (u8)
    pub dig_h1: u8,

    /// 湿度校准系数 2 - 0xE1-0xE2 (小端序)
    pub dig_h2: i16,

    /// 湿度校准系数 3 - 0xE3 (u8)
    pub dig_h3: u8,

    /// 湿度校准系数 4 - 12位有符号数
    ///
    /// ## 存储格式
    /// 0xE4 为 [11:4]，0xE5 的低4位为 [3:0]
    pub dig_h4: i16,

    /// 湿度校准系数 5 - 12位有符号数
    ///
    /// ## 存储格式
    /// 0xE6 为 [11:4]，0xE5 的高4位为 [3:0]
    pub dig_h5: i16,

    /// 湿度校准系数 6 - 0xE7 (i8)
    pub dig_h6: i8,
}

impl Calibration {
    /// 由两块校准寄存器数据解析出校准参数
    ///
    /// - `calib`: 0x88 开始的 26 字节
    /// - `calib_hum`: 0xE1 开始的 8 字节
    pub fn from_registers(calib: &[u8; CALIB_LEN], calib_hum: &[u8; CALIB_HUM_LEN]) -> Self {
        let mut this = Self::default();
        this.unpack_temperature_pressure(calib);
        this.unpack_humidity(calib_hum);

        // OK
        this
    }

    /// 解析温度/压力校准参数和 dig_H1
    fn unpack_temperature_pressure(&mut self, buf: &[u8; CALIB_LEN]) {
        let u16_at = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([buf[i], buf[i + 1]]);

        self.dig_t1 = u16_at(0);
        self.dig_t2 = i16_at(2);
        self.dig_t3 = i16_at(4);
        self.dig_p1 = u16_at(6);
        self.dig_p2 = i16_at(8);
        self.dig_p3 = i16_at(10);
        self.dig_p4 = i16_at(12);
        self.dig_p5 = i16_at(14);
        self.dig_p6 = i16_at(16);
        self.dig_p7 = i16_at(18);
        self.dig_p8 = i16_at(20);
        self.dig_p9 = i16_at(22);
        // buf[24] 对应 0xA0，未使用
        self.dig_h1 = buf[25];
    }

    /// 解析 0xE1 开始的湿度校准参数
    fn unpack_humidity(&mut self, buf: &[u8; CALIB_HUM_LEN]) {
        self.dig_h2 = i16::from_le_bytes([buf[0], buf[1]]);
        self.dig_h3 = buf[2];
        let (dig_h4, dig_h5) = unpack_h4_h5(buf[3], buf[4], buf[5]);
        self.dig_h4 = dig_h4;
        self.dig_h5 = dig_h5;
        self.dig_h6 = buf[6] as i8;
    }
}

/// 拆分共用 0xE5 的 dig_H4 / dig_H5
///
/// - dig_H4 = 0xE4 << 4 | 0xE5[3:0]
/// - dig_H5 = 0xE6 << 4 | 0xE5[7:4]
///
/// 高字节按有符号数扩展
pub fn unpack_h4_h5(e4: u8, e5: u8, e6: u8) -> (i16, i16) {
    let dig_h4 = (i16::from(e4 as i8) << 4) | i16::from(e5 & 0x0F);
    let dig_h5 = (i16::from(e6 as i8) << 4) | i16::from(e5 >> 4);

    (dig_h4, dig_h5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_nibble_is_split_between_h4_and_h5() {
        // 0xE4=0x13, 0xE5=0x29, 0xE6=0x03
        assert_eq!(unpack_h4_h5(0x13, 0x29, 0x03), (0x139, 0x032));
    }

    #[test]
    fn h4_h5_high_bytes_are_sign_extended() {
        // 0xFF << 4 | 0xF = -1
        assert_eq!(unpack_h4_h5(0xFF, 0x0F, 0x00), (-1, 0));
        assert_eq!(unpack_h4_h5(0x00, 0xF0, 0xFF), (0, -1));
        assert_eq!(unpack_h4_h5(0x80, 0x00, 0x80), (-2048, -2048));
    }

    #[test]
    fn block_layout() {
        let mut calib = [0u8; CALIB_LEN];
        for (i, b) in calib.iter_mut().enumerate() {
            *b = i as u8;
        }
        let calib_hum = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E, 0xAA];

        let c = Calibration::from_registers(&calib, &calib_hum);
        assert_eq!(c.dig_t1, 0x0100);
        assert_eq!(c.dig_t2, 0x0302);
        assert_eq!(c.dig_p1, 0x0706);
        assert_eq!(c.dig_p9, 0x1716);
        assert_eq!(c.dig_h1, 25);
        assert_eq!(c.dig_h2, 362);
        assert_eq!(c.dig_h3, 0);
        assert_eq!(c.dig_h4, 313);
        assert_eq!(c.dig_h5, 50);
        assert_eq!(c.dig_h6, 30);
    }

    #[test]
    fn negative_coefficients() {
        let mut calib = [0u8; CALIB_LEN];
        // dig_T3 = -1000, dig_P1 = 36477 (超出i16范围)
        calib[4..6].copy_from_slice(&(-1000i16).to_le_bytes());
        calib[6..8].copy_from_slice(&36477u16.to_le_bytes());
        let calib_hum = [0, 0, 0, 0, 0, 0, 0xF6, 0];

        let c = Calibration::from_registers(&calib, &calib_hum);
        assert_eq!(c.dig_t3, -1000);
        assert_eq!(c.dig_p1, 36477);
        assert_eq!(c.dig_h6, -10);
    }
}
