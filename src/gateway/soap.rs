//! SOAP envelopes for the SRI offline web services and their response parsers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::core::{SriError, SriMessage};
use crate::xml::writer::XmlWriter;

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const RECEPTION_NS: &str = "http://ec.gob.sri.ws.recepcion";
pub const AUTHORIZATION_NS: &str = "http://ec.gob.sri.ws.autorizacion";

/// Message identifier the reception service uses for an access key that is
/// already registered (e.g. after a lost response and a resubmission).
pub const ALREADY_REGISTERED_ID: &str = "43";

/// `validarComprobante` request carrying the signed document in base64.
pub fn reception_envelope(signed_xml: &str) -> Result<String, SriError> {
    let payload = STANDARD.encode(signed_xml.as_bytes());
    envelope(RECEPTION_NS, "ec:validarComprobante", "xml", &payload)
}

/// `autorizacionComprobante` request for one access key.
pub fn authorization_envelope(access_key: &str) -> Result<String, SriError> {
    envelope(
        AUTHORIZATION_NS,
        "ec:autorizacionComprobante",
        "claveAccesoComprobante",
        access_key,
    )
}

fn envelope(ns: &str, operation: &str, param: &str, value: &str) -> Result<String, SriError> {
    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "soapenv:Envelope",
        &[("xmlns:soapenv", SOAP_ENV_NS), ("xmlns:ec", ns)],
    )?;
    w.start_element("soapenv:Header")?;
    w.end_element("soapenv:Header")?;
    w.start_element("soapenv:Body")?;
    w.start_element(operation)?;
    w.text_element(param, value)?;
    w.end_element(operation)?;
    w.end_element("soapenv:Body")?;
    w.end_element("soapenv:Envelope")?;
    w.into_string()
}

/// `estado` of a reception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceptionStatus {
    /// `RECIBIDA`
    Received,
    /// `DEVUELTA`
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionResponse {
    pub status: ReceptionStatus,
    pub messages: Vec<SriMessage>,
}

impl ReceptionResponse {
    /// `DEVUELTA` only because the key is already registered.
    pub fn is_already_registered(&self) -> bool {
        self.status == ReceptionStatus::Returned
            && !self.messages.is_empty()
            && self
                .messages
                .iter()
                .all(|m| m.identifier == ALREADY_REGISTERED_ID)
    }
}

/// `estado` of one authorization entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    /// `AUTORIZADO`
    Authorized,
    /// `NO AUTORIZADO`
    NotAuthorized,
    /// `EN PROCESO`, or no authorization on record yet.
    InProcess,
}

/// One `autorizacion` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub status: AuthorizationStatus,
    /// `numeroAutorizacion` (equals the access key since the offline scheme).
    pub number: Option<String>,
    /// `fechaAutorizacion` as sent by the SRI.
    pub authorized_at: Option<String>,
    /// `ambiente` label, e.g. `PRUEBAS`.
    pub environment: Option<String>,
    /// Authorized `comprobante` XML, for archival.
    pub document: Option<String>,
    pub messages: Vec<SriMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    /// `claveAccesoConsultada`
    pub access_key: Option<String>,
    pub authorizations: Vec<Authorization>,
}

impl AuthorizationResponse {
    /// Overall status: any `AUTORIZADO` entry wins, otherwise the first
    /// entry decides; no entries means still in process.
    pub fn status(&self) -> AuthorizationStatus {
        self.decisive()
            .map(|a| a.status)
            .unwrap_or(AuthorizationStatus::InProcess)
    }

    /// The entry that decides [`status`](Self::status).
    pub fn decisive(&self) -> Option<&Authorization> {
        self.authorizations
            .iter()
            .find(|a| a.status == AuthorizationStatus::Authorized)
            .or_else(|| self.authorizations.first())
    }
}

/// Collects `mensaje` entries; the SRI nests a `mensaje` text element inside
/// each `mensaje` record.
#[derive(Default)]
struct MessageCollector {
    current: Option<SriMessage>,
    done: Vec<SriMessage>,
}

impl MessageCollector {
    fn start(&mut self, name: &str, path: &[String]) {
        if name == "mensaje" && path.last().map(String::as_str) != Some("mensaje") {
            self.current = Some(SriMessage {
                identifier: String::new(),
                message: String::new(),
                additional_info: None,
                kind: String::new(),
            });
        }
    }

    fn text(&mut self, path: &[String], text: &str) -> bool {
        let Some(msg) = self.current.as_mut() else {
            return false;
        };
        let n = path.len();
        if n < 2 || !path[..n - 1].iter().any(|p| p == "mensaje") {
            return false;
        }
        match path[n - 1].as_str() {
            "identificador" => msg.identifier = text.to_string(),
            "mensaje" => msg.message = text.to_string(),
            "informacionAdicional" => msg.additional_info = Some(text.to_string()),
            "tipo" => msg.kind = text.to_string(),
            _ => return false,
        }
        true
    }

    fn end(&mut self, ended: &str, path: &[String]) {
        if ended == "mensaje" && path.last().map(String::as_str) != Some("mensaje") {
            if let Some(msg) = self.current.take() {
                self.done.push(msg);
            }
        }
    }

    fn take(&mut self) -> Vec<SriMessage> {
        std::mem::take(&mut self.done)
    }
}

/// Event callbacks shared by both response parsers.
trait ResponseHandler {
    fn start(&mut self, name: &str, path: &[String]);
    fn text(&mut self, path: &[String], text: &str);
    fn end(&mut self, ended: &str, path: &[String]);
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Walk a SOAP response, tracking the local-name path. SOAP faults become
/// transport errors.
fn walk<H: ResponseHandler>(xml: &str, handler: &mut H) -> Result<(), SriError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut fault: Option<String> = None;
    let mut in_fault = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.local_name().as_ref());
                if name == "Fault" {
                    in_fault = true;
                }
                handler.start(&name, &path);
                path.push(name);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| SriError::Transport(format!("malformed SRI response: {err}")))?;
                if in_fault && path.last().map(String::as_str) == Some("faultstring") {
                    fault = Some(text.to_string());
                }
                handler.text(&path, &text);
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                handler.text(&path, &String::from_utf8_lossy(&raw));
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                handler.end(&ended, &path);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SriError::Transport(format!(
                    "malformed SRI response at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if in_fault {
        return Err(SriError::Transport(format!(
            "SOAP fault: {}",
            fault.unwrap_or_else(|| "no faultstring".into())
        )));
    }
    Ok(())
}

#[derive(Default)]
struct ReceptionParser {
    status: Option<String>,
    messages: MessageCollector,
}

impl ResponseHandler for ReceptionParser {
    fn start(&mut self, name: &str, path: &[String]) {
        self.messages.start(name, path);
    }

    fn text(&mut self, path: &[String], text: &str) {
        if self.messages.text(path, text) {
            return;
        }
        if path.last().map(String::as_str) == Some("estado") {
            self.status = Some(text.trim().to_string());
        }
    }

    fn end(&mut self, ended: &str, path: &[String]) {
        self.messages.end(ended, path);
    }
}

/// Parse a `validarComprobanteResponse`.
pub fn parse_reception_response(xml: &str) -> Result<ReceptionResponse, SriError> {
    let mut parser = ReceptionParser::default();
    walk(xml, &mut parser)?;

    let status = match parser.status.as_deref() {
        Some("RECIBIDA") => ReceptionStatus::Received,
        Some("DEVUELTA") => ReceptionStatus::Returned,
        Some(other) => {
            return Err(SriError::Transport(format!(
                "unknown reception status '{other}'"
            )));
        }
        None => {
            return Err(SriError::Transport(
                "reception response has no estado".into(),
            ));
        }
    };
    Ok(ReceptionResponse {
        status,
        messages: parser.messages.take(),
    })
}

#[derive(Default)]
struct PendingAuthorization {
    status: Option<String>,
    number: Option<String>,
    authorized_at: Option<String>,
    environment: Option<String>,
    document: Option<String>,
}

#[derive(Default)]
struct AuthorizationParser {
    access_key: Option<String>,
    current: Option<PendingAuthorization>,
    done: Vec<(PendingAuthorization, Vec<SriMessage>)>,
    messages: MessageCollector,
}

impl ResponseHandler for AuthorizationParser {
    fn start(&mut self, name: &str, path: &[String]) {
        if name == "autorizacion" {
            self.current = Some(PendingAuthorization::default());
        }
        self.messages.start(name, path);
    }

    fn text(&mut self, path: &[String], text: &str) {
        if self.messages.text(path, text) {
            return;
        }
        let Some(last) = path.last().map(String::as_str) else {
            return;
        };
        if last == "claveAccesoConsultada" {
            self.access_key = Some(text.trim().to_string());
            return;
        }
        let in_entry = path.len() >= 2 && path[path.len() - 2] == "autorizacion";
        let Some(entry) = self.current.as_mut().filter(|_| in_entry) else {
            return;
        };
        match last {
            "estado" => entry.status = Some(text.trim().to_string()),
            "numeroAutorizacion" => entry.number = Some(text.trim().to_string()),
            "fechaAutorizacion" => entry.authorized_at = Some(text.trim().to_string()),
            "ambiente" => entry.environment = Some(text.trim().to_string()),
            "comprobante" => entry.document.get_or_insert_with(String::new).push_str(text),
            _ => {}
        }
    }

    fn end(&mut self, ended: &str, path: &[String]) {
        self.messages.end(ended, path);
        if ended == "autorizacion" {
            if let Some(entry) = self.current.take() {
                self.done.push((entry, self.messages.take()));
            }
        }
    }
}

/// Parse an `autorizacionComprobanteResponse`.
pub fn parse_authorization_response(xml: &str) -> Result<AuthorizationResponse, SriError> {
    let mut parser = AuthorizationParser::default();
    walk(xml, &mut parser)?;

    let mut authorizations = Vec::with_capacity(parser.done.len());
    for (entry, messages) in parser.done {
        let status = match entry.status.as_deref() {
            Some("AUTORIZADO") => AuthorizationStatus::Authorized,
            Some("NO AUTORIZADO") => AuthorizationStatus::NotAuthorized,
            Some("EN PROCESO") | Some("EN PROCESAMIENTO") => AuthorizationStatus::InProcess,
            Some(other) => {
                return Err(SriError::Transport(format!(
                    "unknown authorization status '{other}'"
                )));
            }
            None => {
                return Err(SriError::Transport(
                    "authorization entry has no estado".into(),
                ));
            }
        };
        authorizations.push(Authorization {
            status,
            number: entry.number,
            authorized_at: entry.authorized_at,
            environment: entry.environment,
            document: entry.document,
            messages,
        });
    }

    Ok(AuthorizationResponse {
        access_key: parser.access_key,
        authorizations,
    })
}
