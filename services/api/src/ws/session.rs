//! Manages the primary WebSocket connection lifecycle for a training session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::{speech::AzureSynthesizer, state::AppState};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use samtale_core::{
    Command,
    activity::{ActivityLog, EventType, InputSource},
    gateway::ModelGateway,
    identity::{CAP_CREATE_ROLEPLAY, CAP_USE_PROGRAM, Identity, authorize},
    options::{InputModality, universal_tiles},
    orchestrator::{TurnOrchestrator, TurnOutcome, UserInput},
    scenario::ScenarioContext,
    speech::SpeechSink,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Performs the initial handshake (account lookup, authorization, scenario
/// resolution) and then spawns the session loop.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx: SocketSink = Arc::new(Mutex::new(socket_tx));

    // The first message from the client must be an `init` message.
    let init = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => initialize_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let (identity, scenario) = match init {
        Ok(parts) => parts,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let mut sink = socket_tx.lock().await;
            let _ = send_msg(
                &mut sink,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let session_span =
        tracing::info_span!("training_session", %session_id, username = %identity.id);
    tokio::spawn(
        async move {
            if let Err(e) =
                run_training_session(state, socket_tx, socket_rx, identity, scenario).await
            {
                error!(error = ?e, "Training session terminated with error.");
            }
            info!("Training session finished.");
        }
        .instrument(session_span),
    );
}

/// Parses the `init` message, loads the account, and resolves the scenario.
async fn initialize_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(Identity, ScenarioContext)> {
    let init_msg: ClientMessage = serde_json::from_str(init_text)?;
    let ClientMessage::Init {
        username,
        scenario_title,
        custom_scenario,
    } = init_msg
    else {
        return Err(anyhow!("First message must be `init`"));
    };

    let user = state
        .db
        .get_user(&username.trim().to_lowercase())
        .await?
        .context("Ukendt bruger.")?;
    let identity = user.to_identity();
    if !authorize(&identity, CAP_USE_PROGRAM) {
        bail!("Din rolle har ikke adgang til samtaletræning.");
    }
    let scenario = resolve_scenario(state, &identity, scenario_title, custom_scenario)?;
    Ok((identity, scenario))
}

/// Picks the scenario for the session. Custom scenarios require the
/// roleplay-creation capability; with nothing selected the first catalogue
/// entry is used.
fn resolve_scenario(
    state: &AppState,
    identity: &Identity,
    scenario_title: Option<String>,
    custom_scenario: Option<ScenarioContext>,
) -> Result<ScenarioContext> {
    if let Some(custom) = custom_scenario {
        if !authorize(identity, CAP_CREATE_ROLEPLAY) {
            bail!("Din rolle kan ikke oprette egne scenarier.");
        }
        return Ok(ScenarioContext::ad_hoc(
            &custom.title,
            &custom.description,
            &custom.prompt_addition,
            custom.first_message.as_deref().unwrap_or(""),
        ));
    }
    if let Some(title) = scenario_title {
        return state
            .scenarios
            .get(&title)
            .with_context(|| format!("Ukendt scenarie '{title}'."));
    }
    state
        .scenarios
        .list()
        .into_iter()
        .next()
        .context("Der er ingen scenarier konfigureret.")
}

/// The main event loop for an active training session.
async fn run_training_session(
    state: Arc<AppState>,
    socket_tx: SocketSink,
    mut socket_rx: SplitStream<WebSocket>,
    identity: Identity,
    scenario: ScenarioContext,
) -> Result<()> {
    let voice = Arc::new(ClientVoice {
        synthesizer: state.synthesizer.clone(),
        socket_tx: socket_tx.clone(),
    });
    let gateway: &dyn ModelGateway = state.gateway.as_ref();
    let mut orchestrator = TurnOrchestrator::new(scenario.clone());
    let mut modality = InputModality::Pictorial;

    record(&state, &identity, EventType::SessionStart, json!({ "scenario": scenario.title }))
        .await;
    send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::SessionStarted {
            scenario,
            universal_options: universal_tiles(),
        },
    )
    .await?;

    // The automatic opening turn runs before any client input.
    let outcome = orchestrator.seed(gateway).await?;
    deliver_turn(
        &state,
        &socket_tx,
        &identity,
        &orchestrator,
        modality,
        InputSource::SessionStart,
        &voice,
        outcome,
    )
    .await?;

    while let Some(msg_result) = socket_rx.next().await {
        let ws_msg = match msg_result {
            Ok(ws_msg) => ws_msg,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };
        match ws_msg {
            Message::Text(text) => {
                let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) else {
                    warn!("Ignoring unparseable client message.");
                    continue;
                };
                match msg {
                    ClientMessage::Init { .. } => {
                        warn!("Ignoring repeated init message.");
                    }
                    ClientMessage::UserMessage { text } => {
                        run_turn(
                            &state,
                            &socket_tx,
                            &identity,
                            &mut orchestrator,
                            modality,
                            &voice,
                            UserInput::Typed(text),
                        )
                        .await?;
                    }
                    ClientMessage::TapOption { meaning } => {
                        run_turn(
                            &state,
                            &socket_tx,
                            &identity,
                            &mut orchestrator,
                            modality,
                            &voice,
                            UserInput::TappedOption(meaning),
                        )
                        .await?;
                    }
                    ClientMessage::MetaIntent { intent } => {
                        run_turn(
                            &state,
                            &socket_tx,
                            &identity,
                            &mut orchestrator,
                            modality,
                            &voice,
                            UserInput::Meta(intent),
                        )
                        .await?;
                    }
                    ClientMessage::Transcript { event } => {
                        let spoken = event.final_transcript().map(str::to_string);
                        if let Some(outcome) =
                            orchestrator.handle_transcript(&event, gateway).await?
                        {
                            // The listening flag is spent; mirror that to the client.
                            send_msg(
                                &mut *socket_tx.lock().await,
                                ServerMessage::Listening { enabled: false },
                            )
                            .await?;
                            record(
                                &state,
                                &identity,
                                EventType::UserMessage,
                                json!({
                                    "source": InputSource::Spoken.as_str(),
                                    "text": spoken,
                                }),
                            )
                            .await;
                            deliver_turn(
                                &state,
                                &socket_tx,
                                &identity,
                                &orchestrator,
                                modality,
                                InputSource::Spoken,
                                &voice,
                                outcome,
                            )
                            .await?;
                        }
                    }
                    ClientMessage::SetListening { enabled } => {
                        orchestrator.set_listening(enabled);
                        send_msg(
                            &mut *socket_tx.lock().await,
                            ServerMessage::Listening { enabled },
                        )
                        .await?;
                    }
                    ClientMessage::SetModality {
                        modality: new_modality,
                    } => {
                        modality = new_modality;
                        send_msg(
                            &mut *socket_tx.lock().await,
                            ServerMessage::Options {
                                options: orchestrator.options(modality),
                            },
                        )
                        .await?;
                    }
                    ClientMessage::SelectScenario {
                        scenario_title,
                        custom_scenario,
                    } => {
                        match resolve_scenario(&state, &identity, scenario_title, custom_scenario)
                        {
                            Ok(scenario) => {
                                orchestrator.switch_scenario(scenario.clone());
                                record(
                                    &state,
                                    &identity,
                                    EventType::SessionStart,
                                    json!({ "scenario": scenario.title }),
                                )
                                .await;
                                send_msg(
                                    &mut *socket_tx.lock().await,
                                    ServerMessage::SessionStarted {
                                        scenario,
                                        universal_options: universal_tiles(),
                                    },
                                )
                                .await?;
                                let outcome = orchestrator.seed(gateway).await?;
                                deliver_turn(
                                    &state,
                                    &socket_tx,
                                    &identity,
                                    &orchestrator,
                                    modality,
                                    InputSource::SessionStart,
                                    &voice,
                                    outcome,
                                )
                                .await?;
                            }
                            Err(e) => {
                                send_msg(
                                    &mut *socket_tx.lock().await,
                                    ServerMessage::Error {
                                        message: e.to_string(),
                                    },
                                )
                                .await?;
                            }
                        }
                    }
                    ClientMessage::Reset => {
                        orchestrator.reset();
                        record(
                            &state,
                            &identity,
                            EventType::SessionStart,
                            json!({ "scenario": orchestrator.scenario().title }),
                        )
                        .await;
                        let outcome = orchestrator.seed(gateway).await?;
                        deliver_turn(
                            &state,
                            &socket_tx,
                            &identity,
                            &orchestrator,
                            modality,
                            InputSource::SessionStart,
                            &voice,
                            outcome,
                        )
                        .await?;
                    }
                }
            }
            Message::Binary(_) => {
                warn!("Ignoring binary frame; transcripts arrive as JSON events.");
            }
            Message::Close(_) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    info!("WebSocket connection closed and training session terminated.");
    Ok(())
}

/// Records the user turn, drives one model round-trip, and delivers the
/// resulting reply.
async fn run_turn(
    state: &AppState,
    socket_tx: &SocketSink,
    identity: &Identity,
    orchestrator: &mut TurnOrchestrator,
    modality: InputModality,
    voice: &Arc<ClientVoice>,
    input: UserInput,
) -> Result<()> {
    let source = input.source();
    record(
        state,
        identity,
        EventType::UserMessage,
        json!({ "source": source.as_str(), "text": input.to_model_text() }),
    )
    .await;
    let outcome = orchestrator.submit(input, state.gateway.as_ref()).await?;
    deliver_turn(
        state, socket_tx, identity, orchestrator, modality, source, voice, outcome,
    )
    .await
}

/// Sends one completed turn to the client, records it, and kicks off the
/// best-effort spoken rendition.
#[allow(clippy::too_many_arguments)]
async fn deliver_turn(
    state: &AppState,
    socket_tx: &SocketSink,
    identity: &Identity,
    orchestrator: &TurnOrchestrator,
    modality: InputModality,
    source: InputSource,
    voice: &Arc<ClientVoice>,
    outcome: TurnOutcome,
) -> Result<()> {
    record(
        state,
        identity,
        EventType::AssistantReply,
        json!({
            "source": source.as_str(),
            "fallback": outcome.fallback,
            "degraded": outcome.degradation.is_some(),
        }),
    )
    .await;
    send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::AssistantReply {
            text: outcome.assistant_reply,
            options: orchestrator.options(modality),
            degraded: outcome.degradation.is_some(),
            fallback: outcome.fallback,
        },
    )
    .await?;
    if let Some(Command::Speak(text)) = outcome.command {
        let voice = voice.clone();
        tokio::spawn(async move {
            voice.speak(&text).await;
        });
    }
    Ok(())
}

/// Writes activity events without letting a storage hiccup break the
/// conversation.
async fn record(
    state: &AppState,
    identity: &Identity,
    event_type: EventType,
    payload: serde_json::Value,
) {
    if let Err(error) = state.db.record_event(identity, event_type, payload).await {
        warn!(%error, "failed to record activity event");
    }
}

/// Speaks replies to the client by synthesizing audio and sending it as a
/// base64 frame on the session socket.
struct ClientVoice {
    synthesizer: Option<Arc<AzureSynthesizer>>,
    socket_tx: SocketSink,
}

#[async_trait]
impl SpeechSink for ClientVoice {
    async fn speak(&self, text: &str) {
        let Some(synthesizer) = &self.synthesizer else {
            return;
        };
        match synthesizer.synthesize(text).await {
            Ok(audio) => {
                let data = BASE64.encode(audio);
                let mut sink = self.socket_tx.lock().await;
                if let Err(error) = send_msg(&mut sink, ServerMessage::Audio { data }).await {
                    warn!(%error, "failed to deliver audio frame");
                }
            }
            Err(error) => warn!(%error, "speech synthesis failed"),
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
