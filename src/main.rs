use std::{error::Error, process, rc::Rc};

use duet_session::{
    conf::Conf,
    logging,
    platform::{
        HeadlessMediaDevices, HttpHealthProbe, WebRtcPeerConnectionFactory,
        WebSocketFactory,
    },
    signaling::{StaticTokenProvider, StompSignalingTransport},
    SessionController,
};
use futures::StreamExt as _;
use tokio::{runtime, task::LocalSet};

fn main() {
    let conf = match Conf::parse() {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("Failed to parse config: {}", e);
            process::exit(1);
        }
    };

    let guard = match logging::init(conf.log.level()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to install logger: {}", e);
            process::exit(1);
        }
    };

    let res = run(conf);
    if let Err(e) = &res {
        log::error!("Session failed: {}", e);
    }
    drop(guard);
    if res.is_err() {
        process::exit(1);
    }
}

/// Runs a single session with the native backends until Ctrl-C.
fn run(conf: Conf) -> Result<(), Box<dyn Error>> {
    let rt = runtime::Builder::new_current_thread().enable_all().build()?;

    LocalSet::new().block_on(&rt, async move {
        let session_id = conf.session.id.to_string().into();
        let settings = conf.signaling.settings(session_id)?;
        let transport = Rc::new(StompSignalingTransport::new(
            settings,
            Rc::new(StaticTokenProvider::new(conf.session.token())),
            Rc::new(HttpHealthProbe::new()),
            Rc::new(WebSocketFactory),
        ));
        let factory =
            WebRtcPeerConnectionFactory::new().map_err(|e| e.to_string())?;

        let session = SessionController::new(
            conf.session.config(conf.ice.ice_servers()),
            Rc::new(HeadlessMediaDevices),
            Rc::new(factory),
            transport,
        );

        let mut states = session.on_connection_state_change();
        tokio::task::spawn_local(async move {
            while let Some(state) = states.next().await {
                log::info!("Session is {}", state);
            }
        });

        session.start().await;
        tokio::signal::ctrl_c().await?;
        session.stop();

        Ok::<_, Box<dyn Error>>(())
    })
}
