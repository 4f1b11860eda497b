use chrono::{DateTime, Offset, TimeZone};

use crate::hmi::HmiVector;

/// Port the device's local HTTP API listens on.
pub const DEVICE_PORT: u16 = 1001;

pub const IDLE_HMI: &str =
    "N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N";

/// Reply to a `UI_FLG` heartbeat. The embedded vector is what the vendor
/// cloud answers when it has nothing to write.
pub const HEARTBEAT_ACK: &str = "{|1|0|1|0|0|0|N,N,N,N,1,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N,N|}[|0|||]ACN_FREE <br>\t\t";

/// Reply to any request the listener does not understand.
pub const FILLER: &str = "|}|}\t\t";

pub const CMD_NTP: &str = "UI_NTP";
pub const CMD_HEARTBEAT: &str = "UI_FLG";

pub const PARAM_CMD: &str = "CM";
pub const PARAM_IP: &str = "IP";
pub const PARAM_HMI: &str = "HMI";
pub const PARAM_UPDATE: &str = "UPD";

/// Local time with a `+HH:MM` offset, or `Z` when the host runs on UTC.
pub fn ntp_reply<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let pattern = if now.offset().fix().local_minus_utc() == 0 {
        "%Y-%m-%dT%H:%M:%SZ"
    } else {
        "%Y-%m-%dT%H:%M:%S%:z"
    };
    format!("NTP {} UI SERVER (M.A.V. srl)", now.format(pattern))
}

/// URL for one exchange with the device. Tokens are URL-safe, so the vector
/// goes out with literal commas, which is what the firmware expects.
pub fn exchange_url(base_url: &str, hmi: &HmiVector, write: bool) -> String {
    format!(
        "{base_url}?{PARAM_HMI}={}&{PARAM_UPDATE}={}",
        hmi.encode(),
        u8::from(write)
    )
}
