//! Frame handlers that build up the board identity.
//!
//! Each handler takes the current state and one frame and returns an
//! [`Update`]; none of them touch the codec. The identity summary line is
//! printed after every identity-affecting frame once variant, version and
//! board ID are all known, so it normally shows up more than once.

use {
    crate::{
        device::{ApiVersion, BuildInfo, SessionState, Update, Version},
        error::{Error, Result},
        protocol::Frame,
    },
    log::debug,
};

/// Bytes of board ID at the start of `MSP_BOARD_INFO`.
const BOARD_ID_LEN: usize = 4;

/// Offset of the target name length prefix in `MSP_BOARD_INFO`.
///
/// Board ID (4), hardware revision (u16), OSD type (u8) and VCP flag (u8)
/// come first.
const TARGET_NAME_LEN_OFFSET: usize = 8;

const BUILD_DATE_LEN: usize = 11;
const BUILD_TIME_LEN: usize = 8;

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn with_summary(mut update: Update) -> Update {
    if let Some(summary) = update.state.identity.summary() {
        update.say(summary);
    }
    update
}

/// `MSP_API_VERSION`: protocol, major, minor.
pub fn api_version(state: &SessionState, frame: &Frame) -> Result<Update> {
    let api = ApiVersion {
        protocol: frame.byte(0),
        major: frame.byte(1),
        minor: frame.byte(2),
    };
    let mut next = state.next();
    next.identity.api = Some(api);
    let mut update = Update::new(next);
    update.say(format!(
        "MSP API version {}.{} (protocol {})",
        api.major, api.minor, api.protocol
    ));
    Ok(update)
}

/// `MSP_FC_VARIANT`: the payload is the variant tag.
pub fn variant(state: &SessionState, frame: &Frame) -> Result<Update> {
    let mut next = state.next();
    next.identity.variant = text(&frame.payload);
    Ok(with_summary(Update::new(next)))
}

/// `MSP_FC_VERSION`: major, minor, patch.
pub fn version(state: &SessionState, frame: &Frame) -> Result<Update> {
    let mut reader = frame.reader();
    let bytes = reader
        .read_bytes(3)
        .map_err(|_| Error::Protocol(format!("short version payload: {:?}", frame.payload)))?;
    let mut next = state.next();
    next.identity.version = Version::new(bytes[0], bytes[1], bytes[2]);
    Ok(with_summary(Update::new(next)))
}

/// Target name carried by a board info payload, if it is long enough.
pub fn target_name(payload: &[u8]) -> Option<String> {
    let len = usize::from(*payload.get(TARGET_NAME_LEN_OFFSET)?);
    let start = TARGET_NAME_LEN_OFFSET + 1;
    let name = payload.get(start..start + len)?;
    if name.is_empty() {
        None
    } else {
        Some(text(name))
    }
}

/// `MSP_BOARD_INFO`: board ID, then optionally a length-prefixed target name.
pub fn board_info(state: &SessionState, frame: &Frame) -> Result<Update> {
    let board_id = frame
        .payload
        .get(..BOARD_ID_LEN)
        .ok_or_else(|| Error::Protocol(format!("short board info payload: {:?}", frame.payload)))?;

    let mut next = state.next();
    next.identity.board_id = text(board_id);
    if let Some(name) = target_name(&frame.payload) {
        debug!("Board reports target {name}");
        next.identity.target_name = Some(name);
    }
    Ok(with_summary(Update::new(next)))
}

/// `MSP_BUILD_INFO`: date (11 chars), time (8 chars), revision (the rest).
pub fn build_info(state: &SessionState, frame: &Frame) -> Result<Update> {
    let payload = &frame.payload;
    if payload.len() < BUILD_DATE_LEN + BUILD_TIME_LEN {
        return Err(Error::Protocol(format!(
            "short build info payload ({} bytes)",
            payload.len()
        )));
    }
    let (date, rest) = payload.split_at(BUILD_DATE_LEN);
    let (time, revision) = rest.split_at(BUILD_TIME_LEN);
    let build = BuildInfo {
        date: text(date),
        time: text(time),
        revision: text(revision),
    };

    let message = format!(
        "Build {} (built on {} @ {})",
        build.revision, build.date, build.time
    );
    let mut next = state.next();
    next.identity.build = Some(build);
    let mut update = Update::new(next);
    update.say(message);
    Ok(update)
}

/// `MSP_DEBUGMSG`: trace text pushed by the firmware.
pub fn debug_message(state: &SessionState, frame: &Frame) -> Update {
    let message = text(&frame.payload);
    let message = message.trim_matches(|c| matches!(c, ' ' | '\r' | '\n' | '\t' | '\0'));
    let mut update = Update::new(state.clone());
    update.say(format!("[DEBUG] {message}"));
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Command;

    fn frame(command: Command, payload: &[u8]) -> Frame {
        Frame::for_command(command, payload.to_vec())
    }

    fn board_payload(target: &[u8], declared_len: u8) -> Vec<u8> {
        let mut payload = b"SRF3".to_vec();
        payload.extend_from_slice(&[0, 0, 0, 0]);
        payload.push(declared_len);
        payload.extend_from_slice(target);
        payload
    }

    #[test]
    fn test_board_info_exactly_four_bytes_has_no_target() {
        let update = board_info(
            &SessionState::new(0),
            &frame(Command::BoardInfo, b"SRF3"),
        )
        .unwrap();
        assert_eq!(update.state.identity.board_id, "SRF3");
        assert_eq!(update.state.identity.target_name, None);
    }

    #[test]
    fn test_board_info_with_full_target_name() {
        let payload = board_payload(b"SPRACINGF3", 10);
        assert_eq!(payload.len(), 9 + 10);
        let update = board_info(
            &SessionState::new(0),
            &frame(Command::BoardInfo, &payload),
        )
        .unwrap();
        assert_eq!(
            update.state.identity.target_name.as_deref(),
            Some("SPRACINGF3")
        );
    }

    #[test]
    fn test_board_info_one_byte_short_leaves_target_unset() {
        let payload = board_payload(b"SPRACINGF", 10);
        assert_eq!(payload.len(), 9 + 10 - 1);
        let update = board_info(
            &SessionState::new(0),
            &frame(Command::BoardInfo, &payload),
        )
        .unwrap();
        assert_eq!(update.state.identity.board_id, "SRF3");
        assert_eq!(update.state.identity.target_name, None);
    }

    #[test]
    fn test_board_info_ignores_trailing_bytes_after_target() {
        let mut payload = board_payload(b"OMNIBUSF4", 9);
        payload.extend_from_slice(&[0xFF, 0xFF]);
        assert_eq!(target_name(&payload).as_deref(), Some("OMNIBUSF4"));
    }

    #[test]
    fn test_board_info_too_short_is_protocol_error() {
        let result = board_info(&SessionState::new(0), &frame(Command::BoardInfo, b"SR"));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_summary_only_after_all_three_fields() {
        let state = SessionState::new(0);

        let update = variant(&state, &frame(Command::FcVariant, b"INAV")).unwrap();
        assert!(update.messages.is_empty());

        let update = version(&update.state, &frame(Command::FcVersion, &[1, 9, 0])).unwrap();
        assert!(update.messages.is_empty());

        let update = board_info(&update.state, &frame(Command::BoardInfo, b"SRF3")).unwrap();
        assert_eq!(update.messages, vec!["INAV 1.9.0 (board SRF3)".to_string()]);

        // A later identity frame prints the summary again without changing anything else.
        let again = variant(&update.state, &frame(Command::FcVariant, b"INAV")).unwrap();
        assert_eq!(again.messages, update.messages);
        assert_eq!(again.state.identity, update.state.identity);
        assert_eq!(again.state.revision, update.state.revision + 1);
    }

    #[test]
    fn test_summary_order_independent() {
        let state = SessionState::new(0);
        let update = board_info(
            &state,
            &frame(Command::BoardInfo, &board_payload(b"F3", 2)),
        )
        .unwrap();
        let update = version(&update.state, &frame(Command::FcVersion, &[2, 0, 1])).unwrap();
        assert!(update.messages.is_empty());
        let update = variant(&update.state, &frame(Command::FcVariant, b"INAV")).unwrap();
        assert_eq!(
            update.messages,
            vec!["INAV 2.0.1 (board SRF3, target F3)".to_string()]
        );
    }

    #[test]
    fn test_version_reads_three_bytes_in_order() {
        let update = version(
            &SessionState::new(0),
            &frame(Command::FcVersion, &[3, 2, 1]),
        )
        .unwrap();
        assert_eq!(update.state.identity.version, Version::new(3, 2, 1));
        assert!(version(&SessionState::new(0), &frame(Command::FcVersion, &[3, 2])).is_err());
    }

    #[test]
    fn test_build_info_splits_fixed_width_fields() {
        let update = build_info(
            &SessionState::new(0),
            &frame(Command::BuildInfo, b"Jan 12 201813:45:07a1b2c3d4"),
        )
        .unwrap();
        let build = update.state.identity.build.unwrap();
        assert_eq!(build.date, "Jan 12 2018");
        assert_eq!(build.time, "13:45:07");
        assert_eq!(build.revision, "a1b2c3d4");
        assert_eq!(
            update.messages,
            vec!["Build a1b2c3d4 (built on Jan 12 2018 @ 13:45:07)".to_string()]
        );
    }

    #[test]
    fn test_build_info_seven_char_revision() {
        let update = build_info(
            &SessionState::new(0),
            &frame(Command::BuildInfo, b"Jan 12 201813:45:07a1b2c3d"),
        )
        .unwrap();
        assert_eq!(update.state.identity.build.unwrap().revision, "a1b2c3d");
    }

    #[test]
    fn test_build_info_short_payload() {
        let result = build_info(&SessionState::new(0), &frame(Command::BuildInfo, b"Jan 12 2018"));
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_api_version_message() {
        let update = api_version(
            &SessionState::new(0),
            &frame(Command::ApiVersion, &[0, 2, 1]),
        )
        .unwrap();
        assert_eq!(update.messages, vec!["MSP API version 2.1 (protocol 0)".to_string()]);
        assert_eq!(
            update.state.identity.api,
            Some(ApiVersion {
                protocol: 0,
                major: 2,
                minor: 1
            })
        );
    }

    #[test]
    fn test_debug_message_is_trimmed() {
        let update = debug_message(
            &SessionState::new(0),
            &frame(Command::DebugMsg, b"  gyro calibrated\r\n\0\0"),
        );
        assert_eq!(update.messages, vec!["[DEBUG] gyro calibrated".to_string()]);
        assert_eq!(update.state.revision, 0);
    }
}
