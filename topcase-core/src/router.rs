//! Dispatch of received packets to sinks.

use topcase_proto::{Device, MessageType, Packet, PacketKind};

use crate::error::Error;
use crate::sink::Sinks;

/// Where a routed packet ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// Passed to the keyboard sink.
    Keyboard,
    /// Passed to the trackpad sink's message handler.
    Trackpad,
    /// Passed to the trackpad sink's info handler.
    TrackpadInfo,
    /// Valid, but no sink for the device is attached.
    Dropped(Device),
    /// Part of a multi-packet message. Not reassembled and not delivered,
    /// since its message CRC cannot be checked.
    Fragment(Device),
}

/// Route a verified packet to the matching sink.
///
/// Pure dispatch: no I/O and no retries. The message CRC is checked before
/// anything reaches a sink, so fragments are logged and never delivered.
///
/// # Errors
///
/// - [`Error::ErrorReply`] for error packets
/// - [`Error::UnrecognizedFraming`] for kind/device/type combinations that
///   have no route, or a message length that overruns the packet
/// - [`Error::ChecksumMismatch`] if the message CRC is wrong
pub fn route(packet: &Packet<'_>, sinks: &Sinks<'_>) -> Result<Delivery, Error> {
    let fragment = packet.is_fragment();
    if fragment {
        debug!(
            "fragment from {:?}: remaining {}, offset {}",
            packet.device(),
            packet.remaining(),
            packet.offset()
        );
    }

    match (packet.kind(), packet.device()) {
        (PacketKind::Read, device @ (Device::Keyboard | Device::Touchpad)) => {
            if fragment {
                return Ok(Delivery::Fragment(device));
            }
            let message = packet.message()?;
            match (device, sinks.keyboard, sinks.trackpad) {
                (Device::Keyboard, Some(keyboard), _) => {
                    keyboard.recv_message(&message);
                    Ok(Delivery::Keyboard)
                }
                (Device::Touchpad, _, Some(trackpad)) => {
                    trackpad.recv_message(&message);
                    Ok(Delivery::Trackpad)
                }
                _ => {
                    debug!("{:?} data but no sink attached", device);
                    Ok(Delivery::Dropped(device))
                }
            }
        }
        (PacketKind::Write, Device::Info) => {
            if fragment {
                return Ok(Delivery::Fragment(Device::Info));
            }
            let message = packet.message()?;
            if message.kind() != MessageType::TOUCHPAD_INFO {
                debug!("unknown type for info packet: {:#x}", message.kind().0);
                return Err(Error::UnrecognizedFraming);
            }
            match sinks.trackpad {
                Some(trackpad) => {
                    trackpad.recv_info(&message);
                    Ok(Delivery::TrackpadInfo)
                }
                None => {
                    debug!("touchpad info but no trackpad sink");
                    Ok(Delivery::Dropped(Device::Info))
                }
            }
        }
        (PacketKind::Write, Device::Touchpad) => {
            if fragment {
                return Ok(Delivery::Fragment(Device::Touchpad));
            }
            let message = packet.message()?;
            match sinks.trackpad {
                Some(trackpad) => {
                    trackpad.recv_message(&message);
                    Ok(Delivery::Trackpad)
                }
                None => {
                    debug!("touchpad write reply but no trackpad sink");
                    Ok(Delivery::Dropped(Device::Touchpad))
                }
            }
        }
        (PacketKind::Error, _) => {
            // Reply to a bogus command, or a read with nothing pending.
            debug!("received error packet");
            Err(Error::ErrorReply)
        }
        (kind, device) => {
            debug!("unroutable packet: {:?} from {:?}", kind, device);
            Err(Error::UnrecognizedFraming)
        }
    }
}
