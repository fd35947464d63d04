use screenecho_core::IceServerConfig;

pub const DEFAULT_HOST: &str = "localhost:8080";

pub const DEFAULT_STUN_SERVERS: [&str; 3] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
];

/// Where the room server lives and which ICE servers peer connections use.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            ice_servers: vec![IceServerConfig {
                urls: DEFAULT_STUN_SERVERS.iter().map(|url| (*url).to_owned()).collect(),
                username: None,
                credential: None,
            }],
        }
    }
}

impl ClientConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn room_url(&self, room_id: &screenecho_core::RoomId) -> String {
        format!("ws://{}/room/{}/connect", self.host, room_id)
    }
}
