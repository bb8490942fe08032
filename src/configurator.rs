//! Streaming-mode requests per product variant.
//!
//! | Variant | Enable | Disable |
//! |---|---|---|
//! | Scoop | packet 4/2/3 by frame flags, mode 4 | mouse packets, mode 0 |
//! | FSM-6 | motion-engine output, mode 4, format 0 | mouse packets, mode 0 |
//! | FSM-9 | motion-engine output, mode 4, format 0 | no packets, sleep |

use crate::handle::DeviceHandle;
use crate::protocol::{DataModeControlV2Request, Mode, MotionFields, OutMessage, PacketSelect};
use crate::transport::Connection;
use crate::types::{ProductVariant, StreamConfig};
use crate::Result;

/// How a variant selects its streamed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnableStyle {
    /// Packet select chosen from the body/user frame flags.
    FramePackets,
    /// Motion-engine output with field flags chosen from the frame flags.
    MotionEngine,
}

#[derive(Debug, Clone, Copy)]
struct Capabilities {
    enable: EnableStyle,
    disable: DataModeControlV2Request,
}

const MOUSE_MODE: DataModeControlV2Request = DataModeControlV2Request {
    packet_select: PacketSelect::Mouse,
    mode: Mode::Normal,
    format_select: 0,
    fields: MotionFields::empty(),
};

const SLEEP_MODE: DataModeControlV2Request = DataModeControlV2Request {
    packet_select: PacketSelect::None,
    mode: Mode::Sleep,
    format_select: 0,
    fields: MotionFields::empty(),
};

fn capabilities(variant: ProductVariant) -> Option<Capabilities> {
    match variant {
        ProductVariant::Scoop => Some(Capabilities {
            enable: EnableStyle::FramePackets,
            disable: MOUSE_MODE,
        }),
        ProductVariant::Fsm6 => Some(Capabilities {
            enable: EnableStyle::MotionEngine,
            disable: MOUSE_MODE,
        }),
        ProductVariant::Fsm9 => Some(Capabilities {
            enable: EnableStyle::MotionEngine,
            disable: SLEEP_MODE,
        }),
        ProductVariant::Unsupported => None,
    }
}

/// Stateless mapping from device variant to data-mode requests.
pub struct ProtocolConfigurator;

impl ProtocolConfigurator {
    /// The request that turns motion streaming on, or `None` for
    /// unsupported products.
    pub fn enable_message(variant: ProductVariant, config: StreamConfig) -> Option<OutMessage> {
        let caps = capabilities(variant)?;
        let config = config.effective();

        let request = match caps.enable {
            EnableStyle::FramePackets => {
                let packet_select = match (config.send_body_frames, config.send_user_frames) {
                    (true, true) => PacketSelect::BodyUserFrame,
                    (true, false) => PacketSelect::BodyFrame,
                    _ => PacketSelect::UserFrame,
                };
                DataModeControlV2Request {
                    packet_select,
                    mode: Mode::FullMotionOn,
                    format_select: 0,
                    fields: MotionFields::empty(),
                }
            }
            EnableStyle::MotionEngine => {
                let mut fields = MotionFields::empty();
                if config.send_body_frames {
                    fields |= MotionFields::ACCELERATION
                        | MotionFields::ANGULAR_VELOCITY
                        | MotionFields::CURSOR;
                }
                if config.send_user_frames {
                    fields |= MotionFields::ANGULAR_POSITION | MotionFields::CURSOR;
                }
                DataModeControlV2Request {
                    packet_select: PacketSelect::MotionEngineOutput,
                    mode: Mode::FullMotionOn,
                    format_select: 0,
                    fields,
                }
            }
        };

        Some(OutMessage::DataModeControlV2(request))
    }

    /// The request that returns the device to its idle mode.
    pub fn disable_message(variant: ProductVariant) -> Option<OutMessage> {
        capabilities(variant).map(|caps| OutMessage::DataModeControlV2(caps.disable))
    }

    /// Send the enable request. Returns `Ok(false)` without sending anything
    /// for unsupported products.
    pub fn configure<C: Connection>(
        handle: &mut DeviceHandle<C>,
        config: StreamConfig,
    ) -> Result<bool> {
        let identity = handle.identity();
        let Some(msg) = Self::enable_message(identity.variant(), config) else {
            log::warn!(
                "Unsupported Freespace device PID=0x{:04X}; not configuring",
                identity.product_id
            );
            return Ok(false);
        };
        log::trace!("Configuring device {}: {:?}", handle.id(), msg);
        handle.send(&msg)?;
        Ok(true)
    }

    /// Send the disable request. Returns `Ok(false)` for unsupported products.
    pub fn unconfigure<C: Connection>(handle: &mut DeviceHandle<C>) -> Result<bool> {
        let identity = handle.identity();
        let Some(msg) = Self::disable_message(identity.variant()) else {
            log::warn!(
                "Unsupported Freespace device PID=0x{:04X}; not unconfiguring",
                identity.product_id
            );
            return Ok(false);
        };
        log::debug!("Unconfiguring device {}: {:?}", handle.id(), msg);
        handle.send(&msg)?;
        Ok(true)
    }
}
