use embedded_hal::spi::Operation;

use super::{BusType, Device};

/// SPI读操作时寄存器地址最高位置1
const SPI_READ_BIT: u8 = 0x80;

/// SPI总线上的寄存器设备
///
/// 片选由`embedded_hal::spi::SpiDevice`实现负责
pub struct SpiDevice<S> {
    spi: S,
}

impl<S> SpiDevice<S>
where
    S: embedded_hal::spi::SpiDevice,
{
    /// 创建SPI设备
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// 取回SPI通信句柄
    pub fn release(self) -> S {
        self.spi
    }
}

impl<S> Device for SpiDevice<S>
where
    S: embedded_hal::spi::SpiDevice + Send,
{
    fn bus_type(&self) -> BusType {
        BusType::Spi
    }

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> anyhow::Result<()> {
        // 地址与读取放在同一个片选周期内
        self.spi
            .transaction(&mut [Operation::Write(&[reg | SPI_READ_BIT]), Operation::Read(buf)])
            .map_err(|err| anyhow::anyhow!("SPI读取寄存器0x{:02X}失败: {:?}", reg, err))
    }

    fn write_register(&mut self, reg: u8, value: u8) -> anyhow::Result<()> {
        // 写地址的最高位由调用方清除
        self.spi
            .write(&[reg, value])
            .map_err(|err| anyhow::anyhow!("SPI写入寄存器0x{:02X}失败: {:?}", reg, err))
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction};

    use super::*;

    #[test]
    fn read_sets_top_address_bit() {
        let expectations = [
            Transaction::transaction_start(),
            Transaction::write_vec(vec![0xD0 | 0x80]),
            Transaction::read_vec(vec![0x60]),
            Transaction::transaction_end(),
        ];
        let mut device = SpiDevice::new(SpiMock::new(&expectations));

        let mut id = [0u8; 1];
        device.read_registers(0xD0, &mut id).unwrap();
        assert_eq!(id[0], 0x60);
        assert_eq!(device.bus_type(), BusType::Spi);

        device.release().done();
    }

    #[test]
    fn write_sends_address_unchanged() {
        let expectations = [
            Transaction::transaction_start(),
            Transaction::write_vec(vec![0x74, 0x57]),
            Transaction::transaction_end(),
        ];
        let mut device = SpiDevice::new(SpiMock::new(&expectations));

        device.write_register(0x74, 0x57).unwrap();

        device.release().done();
    }
}
