//! Black-box scenarios replayed against an in-process mock bridge,
//! mirroring spec.md §8's literal end-to-end byte sequences.

use comfoconnect::session::SessionConfig;
use comfoconnect::Bridge;
use comfoconnect_proto::{
    CnRmiRequest, CnRmiResponse, CnRpdoNotification, GatewayEnvelope, GatewayOperation,
    GatewayStatus, OperationType, RegisterAppConfirm, StartSessionConfirm,
};
use comfoconnect_wire::TypeTag;
use env_logger::Env;
use pretty_assertions::assert_eq;
use prost::Message;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Install the env-filtered logger, in the style of the teacher's own
/// `tests/replay-*.rs` fixtures. Unlike those (one binary per file), this
/// file holds several `#[tokio::test]`s in one binary, so `try_init` rather
/// than `init` is used to tolerate the second and later calls.
fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

async fn read_frame(socket: &mut TcpStream) -> GatewayEnvelope {
    let mut len_buf = [0u8; 4];
    socket.read_exact(&mut len_buf).await.unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    socket.read_exact(&mut payload).await.unwrap();
    GatewayEnvelope::decode(payload.as_slice()).unwrap()
}

async fn write_frame(socket: &mut TcpStream, envelope: &GatewayEnvelope) {
    let payload = envelope.encode_to_vec();
    socket.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
    socket.write_all(&payload).await.unwrap();
}

fn confirm(op_type: OperationType, reference: u32, payload: Vec<u8>) -> GatewayEnvelope {
    GatewayEnvelope {
        src: vec![0; 16],
        dst: vec![0; 16],
        operation: Some(GatewayOperation {
            r#type: op_type as i32,
            reference,
        }),
        payload,
    }
}

async fn run_handshake(socket: &mut TcpStream) {
    let register = read_frame(socket).await;
    let register_reference = register.operation.unwrap().reference;
    write_frame(
        socket,
        &confirm(
            OperationType::RegisterAppConfirm,
            register_reference,
            RegisterAppConfirm { status: Some(GatewayStatus { code: 0 }) }.encode_to_vec(),
        ),
    )
    .await;

    let start = read_frame(socket).await;
    let start_reference = start.operation.unwrap().reference;
    write_frame(
        socket,
        &confirm(
            OperationType::StartSessionConfirm,
            start_reference,
            StartSessionConfirm { status: Some(GatewayStatus { code: 0 }) }.encode_to_vec(),
        ),
    )
    .await;
}

fn test_config(addr: std::net::SocketAddr) -> SessionConfig {
    SessionConfig {
        addr,
        local_uuid: [1; 16],
        bridge_uuid: [2; 16],
        device_name: "test".to_owned(),
        pin: 1234,
        request_timeout: Duration::from_secs(5),
        keepalive_interval: Duration::from_secs(60),
        auto_reconnect: false,
    }
}

#[tokio::test]
async fn scenario_get_ventilation_unit_name() {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        run_handshake(&mut socket).await;

        let rmi_request = read_frame(&mut socket).await;
        let rmi_reference = rmi_request.operation.unwrap().reference;
        let request = CnRmiRequest::decode(rmi_request.payload.as_slice()).unwrap();
        assert_eq!(request.node_id, 1);

        let mut name = b"ComfoAirQ".to_vec();
        name.push(0);
        write_frame(
            &mut socket,
            &confirm(
                OperationType::CnRmiResponse,
                rmi_reference,
                CnRmiResponse { result: 0, message: name }.encode_to_vec(),
            ),
        )
        .await;
    });

    let bridge = Bridge::new(test_config(addr));
    bridge.connect().await.unwrap();

    let value = bridge
        .get_property(0x01, 0x01, 0x14, TypeTag::String)
        .await
        .unwrap();

    assert_eq!(value, comfoconnect_wire::Value::String("ComfoAirQ".to_owned()));

    bridge.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn scenario_subscribe_outdoor_temperature_and_receive_sample() {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        run_handshake(&mut socket).await;

        let subscribe_request = read_frame(&mut socket).await;
        let subscribe_reference = subscribe_request.operation.unwrap().reference;
        write_frame(
            &mut socket,
            &confirm(
                OperationType::CnRpdoConfirm,
                subscribe_reference,
                comfoconnect_proto::CnRpdoConfirm { status: Some(GatewayStatus { code: 0 }) }
                    .encode_to_vec(),
            ),
        )
        .await;

        // Unsolicited notification: reference 0.
        write_frame(
            &mut socket,
            &confirm(
                OperationType::CnRpdoNotification,
                0,
                CnRpdoNotification { pdid: 276, data: vec![0x3c, 0x00] }.encode_to_vec(),
            ),
        )
        .await;

        // Keep the socket open past the end of the test body.
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let bridge = Bridge::new(test_config(addr));
    bridge.connect().await.unwrap();

    let value = bridge.show_sensor_once(276, TypeTag::I16).await.unwrap();

    assert_eq!(value, comfoconnect_wire::Value::I16(60));

    bridge.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn scenario_not_registered_surfaces_session_error() {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let register = read_frame(&mut socket).await;
        let register_reference = register.operation.unwrap().reference;
        write_frame(
            &mut socket,
            &confirm(
                OperationType::RegisterAppConfirm,
                register_reference,
                RegisterAppConfirm { status: Some(GatewayStatus { code: 1 }) }.encode_to_vec(),
            ),
        )
        .await;

        let start = read_frame(&mut socket).await;
        let start_reference = start.operation.unwrap().reference;
        write_frame(
            &mut socket,
            &confirm(
                OperationType::StartSessionConfirm,
                start_reference,
                StartSessionConfirm { status: Some(GatewayStatus { code: 1 }) }.encode_to_vec(),
            ),
        )
        .await;
    });

    let bridge = Bridge::new(test_config(addr));
    let err = bridge.connect().await.unwrap_err();

    assert!(matches!(
        err,
        comfoconnect::Error::Session(comfoconnect::error::SessionError::NotRegistered)
    ));

    server.await.unwrap();
}
