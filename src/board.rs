//! The LNBoard: which chip sits where, and the named outputs built from them.
//!
//! Sub-bus 0 of the multiplexer carries the two DACs, the GPIO expander and the four current
//! rheostats; sub-bus 1 carries the LDO rheostat.
//!
//! ```ignore
//! let bus = MuxedBus::new(Pca9542a::new(i2c, false, false, false));
//! let chips = LnChips::new(&bus);
//! let mut board = LnBoard::new(&chips, BoardConfig::default())?;
//! board.init()?;
//! board.isource_a.set_current(100e-6, Some(1.024))?;
//! ```

use core::cell::RefCell;

use embedded_hal::i2c::I2c;

use crate::{
    bus::{MuxedBus, SubBusDevice},
    channel::{DacChannel, GpioBank, GpioPin, RheostatChannel},
    current_source::CurrentSource,
    error::{ArgumentError, Result},
    ldo::Ldo,
    max5815::{AddrPin, Channel, DacResolution, Max5815, Package, Reference},
    mcp23008::Mcp23008,
    mcp466x::{FullScale, Mcp466x, Resolution, Wiper},
    pca9542a::SubBus,
};

/// Board level settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardConfig {
    /// Reference of the voltage output DAC.
    pub vref_reference: Reference,
    /// Keep the voltage DAC reference on when all its outputs are powered down.
    pub vref_always_on: bool,
    /// Reference of the current reference DAC.
    pub iref_reference: Reference,
    pub iref_always_on: bool,
    /// Bias current of the LDO feedback rheostat, in Ampere.
    pub ldo_bias_current: f64,
    /// First GPIO expander bit used by the range pins.
    pub range_pin_offset: u8,
    /// Direction of the range pins, a set bit makes the pin an input.
    pub range_pin_inputs: u8,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardConfig {
    /// Settings of the board as built.
    pub const fn new() -> Self {
        Self {
            vref_reference: Reference::Internal2V5,
            vref_always_on: true,
            iref_reference: Reference::Internal2V048,
            iref_always_on: true,
            ldo_bias_current: 100e-6,
            range_pin_offset: 4,
            range_pin_inputs: 0b0000,
        }
    }
}

/// A bus handle on one of the board's sub-buses.
pub type BoardBus<'a, I2C> = SubBusDevice<'a, I2C>;

/// Current source or sink of the board.
pub type BoardCurrentSource<'b, 'a, I2C> = CurrentSource<
    DacChannel<'b, BoardBus<'a, I2C>>,
    RheostatChannel<'b, BoardBus<'a, I2C>>,
    GpioPin<'b, BoardBus<'a, I2C>>,
>;

/// LDO of the board.
pub type BoardLdo<'b, 'a, I2C> = Ldo<RheostatChannel<'b, BoardBus<'a, I2C>>>;

/// The physical chips of the board.
pub struct LnChips<'a, I2C> {
    /// Voltage output DAC.
    pub dac_vref: RefCell<Max5815<BoardBus<'a, I2C>>>,
    /// Reference DAC of the current sources and sinks.
    pub dac_iref: RefCell<Max5815<BoardBus<'a, I2C>>>,
    /// Range pins.
    pub gpio: RefCell<Mcp23008<BoardBus<'a, I2C>>>,
    pub rheo_isink_5k: RefCell<Mcp466x<BoardBus<'a, I2C>>>,
    pub rheo_isink_100k: RefCell<Mcp466x<BoardBus<'a, I2C>>>,
    pub rheo_isource_5k: RefCell<Mcp466x<BoardBus<'a, I2C>>>,
    pub rheo_isource_100k: RefCell<Mcp466x<BoardBus<'a, I2C>>>,
    pub rheo_ldo: RefCell<Mcp466x<BoardBus<'a, I2C>>>,
}

impl<'a, I2C: I2c> LnChips<'a, I2C> {
    pub fn new(bus: &'a MuxedBus<I2C>) -> Self {
        let dac = |addr0| {
            let package = Package::Tssop {
                addr1: AddrPin::Low,
                addr0,
            };
            RefCell::new(Max5815::new(
                bus.sub_bus(SubBus::Zero),
                package,
                DacResolution::Bits12,
            ))
        };
        let rheostat = |sub_bus, addr1, addr0, fullscale| {
            RefCell::new(Mcp466x::new(
                bus.sub_bus(sub_bus),
                addr1,
                addr0,
                fullscale,
                Resolution::Bits8,
            ))
        };
        Self {
            dac_vref: dac(AddrPin::Low),
            dac_iref: dac(AddrPin::High),
            gpio: RefCell::new(Mcp23008::new(bus.sub_bus(SubBus::Zero), false, false, false)),
            rheo_isink_5k: rheostat(SubBus::Zero, false, false, FullScale::R5k),
            rheo_isink_100k: rheostat(SubBus::Zero, false, true, FullScale::R100k),
            rheo_isource_5k: rheostat(SubBus::Zero, true, false, FullScale::R5k),
            rheo_isource_100k: rheostat(SubBus::Zero, true, true, FullScale::R100k),
            rheo_ldo: rheostat(SubBus::One, false, false, FullScale::R50k),
        }
    }
}

/// The named outputs of the board.
pub struct LnBoard<'b, 'a, I2C> {
    pub dac_va: DacChannel<'b, BoardBus<'a, I2C>>,
    pub dac_vb: DacChannel<'b, BoardBus<'a, I2C>>,
    pub dac_vc: DacChannel<'b, BoardBus<'a, I2C>>,
    pub dac_vd: DacChannel<'b, BoardBus<'a, I2C>>,
    /// GPIO expander bits holding the range pins.
    pub gpio: GpioBank<'b, BoardBus<'a, I2C>>,
    pub isource_a: BoardCurrentSource<'b, 'a, I2C>,
    pub isource_b: BoardCurrentSource<'b, 'a, I2C>,
    pub isink_a: BoardCurrentSource<'b, 'a, I2C>,
    pub isink_b: BoardCurrentSource<'b, 'a, I2C>,
    pub ldo_a: BoardLdo<'b, 'a, I2C>,
    pub ldo_b: BoardLdo<'b, 'a, I2C>,
    chips: &'b LnChips<'a, I2C>,
    config: BoardConfig,
}

impl<'b, 'a, I2C: I2c> LnBoard<'b, 'a, I2C> {
    /// Wire the outputs. Nothing is sent on the bus; see [`Self::init`].
    pub fn new(
        chips: &'b LnChips<'a, I2C>,
        config: BoardConfig,
    ) -> core::result::Result<Self, ArgumentError> {
        let gpio = GpioBank::new(&chips.gpio, config.range_pin_offset)?;
        let isink = (&chips.rheo_isink_5k, &chips.rheo_isink_100k);
        let isource = (&chips.rheo_isource_5k, &chips.rheo_isource_100k);
        let dac = &chips.dac_iref;

        let board = Self {
            dac_va: DacChannel::new(&chips.dac_vref, Channel::A),
            dac_vb: DacChannel::new(&chips.dac_vref, Channel::B),
            dac_vc: DacChannel::new(&chips.dac_vref, Channel::C),
            dac_vd: DacChannel::new(&chips.dac_vref, Channel::D),
            gpio,
            isource_a: current_output(dac, Channel::B, isource, Wiper::One, gpio.pin(2)?),
            isource_b: current_output(dac, Channel::A, isource, Wiper::Zero, gpio.pin(3)?),
            isink_a: current_output(dac, Channel::C, isink, Wiper::One, gpio.pin(0)?),
            isink_b: current_output(dac, Channel::D, isink, Wiper::Zero, gpio.pin(1)?),
            ldo_a: Ldo::new(
                RheostatChannel::new(&chips.rheo_ldo, Wiper::Zero),
                config.ldo_bias_current,
            ),
            ldo_b: Ldo::new(
                RheostatChannel::new(&chips.rheo_ldo, Wiper::One),
                config.ldo_bias_current,
            ),
            chips,
            config,
        };
        log::info!("LNBoard outputs ready");
        Ok(board)
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn chips(&self) -> &'b LnChips<'a, I2C> {
        self.chips
    }

    /// Program both DAC references and make the range pins outputs.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        let config = self.config;
        self.chips
            .dac_vref
            .borrow_mut()
            .set_reference(config.vref_reference, config.vref_always_on)?;
        self.chips
            .dac_iref
            .borrow_mut()
            .set_reference(config.iref_reference, config.iref_always_on)?;
        self.gpio.set_direction(config.range_pin_inputs)?;
        log::info!(
            "LNBoard initialised, voltage DAC {:?}, current DAC {:?}",
            config.vref_reference,
            config.iref_reference
        );
        Ok(())
    }
}

type RheostatPair<'b, 'a, I2C> = (
    &'b RefCell<Mcp466x<BoardBus<'a, I2C>>>,
    &'b RefCell<Mcp466x<BoardBus<'a, I2C>>>,
);

/// A current output: one DAC channel, the same wiper of a 5k and a 100k rheostat, one range pin.
fn current_output<'b, 'a, I2C: I2c>(
    dac: &'b RefCell<Max5815<BoardBus<'a, I2C>>>,
    channel: Channel,
    (low, high): RheostatPair<'b, 'a, I2C>,
    wiper: Wiper,
    range_pin: GpioPin<'b, BoardBus<'a, I2C>>,
) -> BoardCurrentSource<'b, 'a, I2C> {
    CurrentSource::new(
        DacChannel::new(dac, channel),
        RheostatChannel::new(low, wiper),
        RheostatChannel::new(high, wiper),
        range_pin,
    )
}
