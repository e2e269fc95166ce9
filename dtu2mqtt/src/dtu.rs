use crate::plant_data::{MicroinverterData, PlantData};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

static MODBUS_PORT: u16 = 502;
static UNIT_ID: u8 = 1;
static READ_HOLDING_REGISTERS: u8 = 0x03;

// DTU register map: serial number of the gateway itself, then one fixed-size
// block per microinverter port. A block whose serial bytes are all zero marks
// the end of the table.
static DTU_SERIAL_ADDRESS: u16 = 0x2000;
static DTU_SERIAL_REGISTERS: u16 = 3;
static MI_DATA_ADDRESS: u16 = 0x1000;
static MI_DATA_STRIDE: u16 = 0x28;
static MI_DATA_REGISTERS: u16 = 0x14;
static MAX_PORTS: u16 = 99;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NetworkState {
    Unknown,
    Online,
    Offline,
}

/// Modbus TCP client for the DTU gateway. Produces one [`PlantData`]
/// snapshot per poll; any network or framing problem ends the cycle early
/// and the caller simply retries on the next one.
pub struct Dtu<'a> {
    host: &'a str,
    state: NetworkState,
    transaction_id: u16,
}

impl<'a> Dtu<'a> {
    pub fn new(host: &'a str) -> Self {
        Self {
            host,
            state: NetworkState::Unknown,
            transaction_id: 0_u16,
        }
    }

    fn set_state(&mut self, new_state: NetworkState) {
        if self.state != new_state {
            self.state = new_state;
            info!("DTU is {new_state:?}");
        }
    }

    pub fn update_state(&mut self) -> Option<PlantData> {
        match self.read_plant_data() {
            Ok(plant) => {
                self.set_state(NetworkState::Online);
                Some(plant)
            }
            Err(e) => {
                debug!("{e:#}");
                self.set_state(NetworkState::Offline);
                None
            }
        }
    }

    fn read_plant_data(&mut self) -> Result<PlantData> {
        let ip: IpAddr = self
            .host
            .parse()
            .context("unable to parse DTU host address")?;
        let address = SocketAddr::new(ip, MODBUS_PORT);
        let mut stream = TcpStream::connect_timeout(&address, Duration::from_millis(1000))?;
        stream.set_read_timeout(Some(Duration::from_millis(2000)))?;
        stream.set_write_timeout(Some(Duration::from_millis(2000)))?;

        let serial_registers =
            self.read_holding_registers(&mut stream, DTU_SERIAL_ADDRESS, DTU_SERIAL_REGISTERS)?;
        let dtu_sn = serial_from_bytes(&registers_to_bytes(&serial_registers));

        let mut microinverters = Vec::new();
        for index in 0..MAX_PORTS {
            let registers = self.read_holding_registers(
                &mut stream,
                MI_DATA_ADDRESS + index * MI_DATA_STRIDE,
                MI_DATA_REGISTERS,
            )?;
            let block = registers_to_bytes(&registers);
            if block[1..7].iter().all(|byte| *byte == 0) {
                break;
            }
            microinverters.push(decode_microinverter(&block));
        }

        Ok(PlantData {
            dtu_sn,
            microinverters,
        })
    }

    fn read_holding_registers(
        &mut self,
        stream: &mut TcpStream,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.transaction_id = self.transaction_id.wrapping_add(1);

        // MBAP header plus a read-holding-registers PDU
        let mut request = Vec::with_capacity(12);
        request.extend_from_slice(&self.transaction_id.to_be_bytes());
        request.extend_from_slice(&0_u16.to_be_bytes());
        request.extend_from_slice(&6_u16.to_be_bytes());
        request.push(UNIT_ID);
        request.push(READ_HOLDING_REGISTERS);
        request.extend_from_slice(&address.to_be_bytes());
        request.extend_from_slice(&count.to_be_bytes());
        stream.write_all(&request)?;

        let mut header = [0_u8; 8];
        stream.read_exact(&mut header)?;
        let transaction_id = u16::from_be_bytes([header[0], header[1]]);
        if transaction_id != self.transaction_id {
            bail!(
                "transaction id mismatch: sent {}, received {transaction_id}",
                self.transaction_id
            );
        }
        let function = header[7];
        if function == READ_HOLDING_REGISTERS | 0x80 {
            let mut exception = [0_u8; 1];
            stream.read_exact(&mut exception)?;
            bail!(
                "modbus exception {:#04x} reading {count} registers at {address:#06x}",
                exception[0]
            );
        }
        if function != READ_HOLDING_REGISTERS {
            bail!("unexpected function code {function:#04x}");
        }

        let mut byte_count = [0_u8; 1];
        stream.read_exact(&mut byte_count)?;
        if byte_count[0] as usize != count as usize * 2 {
            bail!(
                "short register read: expected {} bytes, received {}",
                count * 2,
                byte_count[0]
            );
        }
        let mut data = vec![0_u8; byte_count[0] as usize];
        stream.read_exact(&mut data)?;

        Ok(data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }
}

fn registers_to_bytes(registers: &[u16]) -> Vec<u8> {
    registers
        .iter()
        .flat_map(|register| register.to_be_bytes())
        .collect()
}

// Serial numbers are transported as packed nibbles, e.g. 0x10 0x21 0x62
// 0x80 0x48 0x27 reads "102162804827".
fn serial_from_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn u16_at(block: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([block[offset], block[offset + 1]])
}

fn u32_at(block: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        block[offset],
        block[offset + 1],
        block[offset + 2],
        block[offset + 3],
    ])
}

fn decode_microinverter(block: &[u8]) -> MicroinverterData {
    MicroinverterData {
        data_type: block[0],
        serial_number: serial_from_bytes(&block[1..7]),
        port_number: block[7].into(),
        pv_voltage: f64::from(u16_at(block, 8)) / 10.0,
        pv_current: f64::from(u16_at(block, 10)) / 100.0,
        grid_voltage: f64::from(u16_at(block, 12)) / 10.0,
        grid_frequency: f64::from(u16_at(block, 14)) / 100.0,
        pv_power: f64::from(u16_at(block, 16)) / 10.0,
        today_production: u16_at(block, 18).into(),
        total_production: u32_at(block, 20),
        temperature: f64::from(i16::from_be_bytes([block[24], block[25]])) / 10.0,
        operating_status: u16_at(block, 26),
        alarm_code: u16_at(block, 28),
        alarm_count: u16_at(block, 30),
        link_status: u16_at(block, 32),
    }
}
