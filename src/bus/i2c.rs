use embedded_hal::i2c::{I2c, SevenBitAddress};

use super::{BusType, Device};

/// I2C总线上的寄存器设备
pub struct I2cDevice<I> {
    /// I2C通信句柄
    i2c: I,
    /// I2C从设备地址
    /// - BME280的地址通常为: 0x76 或 0x77
    address: SevenBitAddress,
}

impl<I> I2cDevice<I>
where
    I: I2c,
{
    /// 创建I2C设备
    pub fn new(i2c: I, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    /// 取回I2C通信句柄
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I> Device for I2cDevice<I>
where
    I: I2c + Send,
{
    fn bus_type(&self) -> BusType {
        BusType::I2c
    }

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> anyhow::Result<()> {
        // 先写寄存器地址，再连续读取
        self.i2c
            .write_read(self.address, &[reg], buf)
            .map_err(|err| anyhow::anyhow!("I2C读取寄存器0x{:02X}失败: {:?}", reg, err))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> anyhow::Result<()> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|err| anyhow::anyhow!("I2C写入寄存器0x{:02X}失败: {:?}", reg, err))
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    use super::*;

    const ADDR: u8 = 0x76;

    #[test]
    fn read_registers_issues_write_read() {
        let expectations = [Transaction::write_read(ADDR, vec![0xD0], vec![0x60])];
        let mut device = I2cDevice::new(I2cMock::new(&expectations), ADDR);

        let mut id = [0u8; 1];
        device.read_registers(0xD0, &mut id).unwrap();
        assert_eq!(id[0], 0x60);

        device.release().done();
    }

    #[test]
    fn write_register_sends_address_then_value() {
        let expectations = [Transaction::write(ADDR, vec![0xF4, 0x57])];
        let mut device = I2cDevice::new(I2cMock::new(&expectations), ADDR);

        device.write_register(0xF4, 0x57).unwrap();
        assert_eq!(device.bus_type(), BusType::I2c);

        device.release().done();
    }

    #[test]
    fn bus_error_becomes_anyhow() {
        let expectations = [Transaction::write_read(ADDR, vec![0xF7], vec![0; 8])
            .with_error(embedded_hal::i2c::ErrorKind::Other)];
        let mut device = I2cDevice::new(I2cMock::new(&expectations), ADDR);

        let mut buf = [0u8; 8];
        let err = device.read_registers(0xF7, &mut buf).unwrap_err();
        assert!(err.to_string().contains("0xF7"));

        device.release().done();
    }
}
