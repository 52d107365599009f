//! Server network layer handling TCP connections and the tick loop

use crate::client_manager::{Client, ClientRegistry};
use crate::config::ServerSettings;
use crate::game::World;
use crate::snapshot::{build_snapshot, handshake};
use log::{debug, error, info, warn};
use shared::framing::LineFramer;
use shared::{decode_command, ControlCommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Snapshots buffered per client before new ones are dropped
const OUTBOUND_QUEUE: usize = 64;

const READ_BUFFER: usize = 4096;

/// Messages sent from connection tasks to the world task
#[derive(Debug)]
pub enum ServerMessage {
    Join {
        id: u32,
        name: String,
        addr: SocketAddr,
        sender: mpsc::Sender<Arc<str>>,
    },
    Command {
        id: u32,
        command: ControlCommand,
    },
    Disconnect {
        id: u32,
    },
}

/// What every connection needs to answer a join without asking the world task
#[derive(Debug)]
struct JoinInfo {
    world_size: u32,
    walls: Vec<shared::WallRecord>,
}

/// Main server: owns the world and drives it from a single task
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    world: World,
    clients: ClientRegistry,
    tick_duration: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(addr: &str, settings: &ServerSettings) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_world(addr, settings, World::new(settings)).await
    }

    /// Binds with a pre-built world, e.g. one with a fixed seed.
    pub async fn with_world(
        addr: &str,
        settings: &ServerSettings,
        world: World,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            world,
            clients: ClientRegistry::new(),
            tick_duration: settings.frame_duration(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the task accepting new connections
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let join_info = Arc::new(JoinInfo {
            world_size: self.world.world_size(),
            walls: self.world.walls().to_vec(),
        });

        tokio::spawn(async move {
            let mut next_id: u32 = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let id = next_id;
                        next_id = next_id.wrapping_add(1);
                        debug!("Accepted connection {} from {}", id, addr);

                        let server_tx = server_tx.clone();
                        let join_info = Arc::clone(&join_info);
                        tokio::spawn(async move {
                            handle_connection(stream, addr, id, join_info, server_tx).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Join {
                id,
                name,
                addr,
                sender,
            } => {
                if self.world.add_tank(id, &name) {
                    let name = self.world.tank(id).map(|t| t.name.clone()).unwrap_or(name);
                    self.clients.add_client(Client::new(id, name, addr, sender));
                }
            }
            ServerMessage::Command { id, command } => {
                self.world.apply_command(id, &command, Instant::now());
            }
            ServerMessage::Disconnect { id } => self.drop_client(id),
        }
    }

    /// Flags the tank for its final report and stops sending to the client.
    fn drop_client(&mut self, id: u32) {
        self.world.mark_disconnected(id);
        self.clients.remove_client(id);
    }

    /// One simulation step followed by one broadcast
    fn run_tick(&mut self) {
        let started = Instant::now();
        self.world.tick(started);

        let snapshot = build_snapshot(&mut self.world);
        if !snapshot.is_empty() && !self.clients.is_empty() {
            let snapshot: Arc<str> = Arc::from(snapshot);
            for id in self.clients.broadcast(&snapshot) {
                self.drop_client(id);
            }
        }

        if self.world.tick % 300 == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} clients, {} tanks, {} projectiles, {} beams, {:?} spent",
                self.world.tick,
                self.clients.len(),
                self.world.tank_count(),
                self.world.projectile_count(),
                self.world.beam_count(),
                started.elapsed()
            );
        }
    }

    /// Main server loop: one tick per interval, network messages in between
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.tick_duration);
        // An overrun tick is followed by exactly one immediate tick, never a burst.
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Server started: world {}, tick {:?}",
            self.world.world_size(),
            self.tick_duration
        );

        loop {
            tokio::select! {
                biased;

                _ = tick_interval.tick() => {
                    self.run_tick();
                },

                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// Per-connection receive path: handshake, then commands until the peer goes away
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: u32,
    join_info: Arc<JoinInfo>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (mut reader, mut writer) = stream.into_split();
    let mut framer = LineFramer::new();
    let mut buffer = [0u8; READ_BUFFER];

    // The first complete frame is the player name
    let mut frames = Vec::new();
    while frames.is_empty() {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("Connection {} closed before joining", id);
                return;
            }
            Ok(len) => frames = framer.push(&buffer[..len]),
            Err(e) => {
                debug!("Connection {} failed before joining: {}", id, e);
                return;
            }
        }
    }
    let mut frames = frames.into_iter();
    let name = frames.next().unwrap_or_default().trim().to_string();

    let reply = handshake(id, join_info.world_size, &join_info.walls);
    if let Err(e) = writer.write_all(reply.as_bytes()).await {
        warn!("Failed to send handshake to {}: {}", addr, e);
        return;
    }

    let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE);
    if server_tx
        .send(ServerMessage::Join {
            id,
            name,
            addr,
            sender,
        })
        .is_err()
    {
        return;
    }
    tokio::spawn(write_snapshots(writer, receiver, id));

    // Commands that arrived together with the name
    for frame in frames {
        dispatch_frame(&frame, id, &server_tx);
    }

    read_commands(reader, framer, id, &server_tx).await;

    let _ = server_tx.send(ServerMessage::Disconnect { id });
}

async fn read_commands<R: AsyncRead + Unpin>(
    mut reader: R,
    mut framer: LineFramer,
    id: u32,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) {
    let mut buffer = [0u8; READ_BUFFER];

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(len) => {
                for frame in framer.push(&buffer[..len]) {
                    dispatch_frame(&frame, id, server_tx);
                }
            }
            Err(e) => {
                debug!("Read error on connection {}: {}", id, e);
                break;
            }
        }
    }
}

fn dispatch_frame(frame: &str, id: u32, server_tx: &mpsc::UnboundedSender<ServerMessage>) {
    match decode_command(frame) {
        Some(command) => {
            let _ = server_tx.send(ServerMessage::Command { id, command });
        }
        None => debug!("Dropped malformed frame from {}: {:.80}", id, frame),
    }
}

/// Writer task: drains the client's snapshot queue onto the socket
async fn write_snapshots<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut receiver: mpsc::Receiver<Arc<str>>,
    id: u32,
) {
    while let Some(snapshot) = receiver.recv().await {
        if let Err(e) = writer.write_all(snapshot.as_bytes()).await {
            debug!("Write error on connection {}: {}", id, e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{parse_record, FireMode, MoveDirection, ServerRecord, Vector2D};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn test_server() -> Server {
        let settings = ServerSettings::default();
        let world = World::with_seed(&settings, 21);
        Server::with_world("127.0.0.1:0", &settings, world).await.unwrap()
    }

    fn tanks_in(snapshot: &str) -> Vec<shared::TankRecord> {
        snapshot
            .lines()
            .filter_map(|line| match parse_record(line) {
                Some(ServerRecord::Tank(t)) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_join_then_tick_broadcasts() {
        let mut server = test_server().await;
        let (sender, mut receiver) = mpsc::channel(4);

        server.handle_message(ServerMessage::Join {
            id: 1,
            name: "alice".to_string(),
            addr: test_addr(),
            sender,
        });
        server.run_tick();

        let snapshot = receiver.try_recv().unwrap();
        let tanks = tanks_in(&snapshot);
        assert_eq!(tanks.len(), 1);
        assert_eq!(tanks[0].id, 1);
        assert_eq!(tanks[0].name, "alice");
        assert!(tanks[0].join);
    }

    #[tokio::test]
    async fn test_duplicate_join_is_ignored() {
        let mut server = test_server().await;
        let (s1, _r1) = mpsc::channel(4);
        let (s2, _r2) = mpsc::channel(4);

        server.handle_message(ServerMessage::Join {
            id: 1,
            name: "first".to_string(),
            addr: test_addr(),
            sender: s1,
        });
        server.handle_message(ServerMessage::Join {
            id: 1,
            name: "second".to_string(),
            addr: test_addr(),
            sender: s2,
        });

        assert_eq!(server.clients.len(), 1);
        assert_eq!(server.world.tank(1).unwrap().name, "first");
    }

    #[tokio::test]
    async fn test_command_is_buffered_until_tick() {
        let mut server = test_server().await;
        let (sender, _receiver) = mpsc::channel(4);
        server.handle_message(ServerMessage::Join {
            id: 1,
            name: "a".to_string(),
            addr: test_addr(),
            sender,
        });
        let before = server.world.tank(1).unwrap().location;

        server.handle_message(ServerMessage::Command {
            id: 1,
            command: ControlCommand::new(MoveDirection::Down, FireMode::None, Vector2D::UP),
        });
        assert_eq!(server.world.tank(1).unwrap().location, before);

        server.run_tick();
        let after = server.world.tank(1).unwrap().location;
        assert!(after != before);
    }

    #[tokio::test]
    async fn test_disconnect_reported_once_then_removed() {
        let mut server = test_server().await;
        let (s1, _r1) = mpsc::channel(8);
        let (s2, mut r2) = mpsc::channel(8);
        for (id, sender) in [(1, s1), (2, s2)] {
            server.handle_message(ServerMessage::Join {
                id,
                name: format!("p{}", id),
                addr: test_addr(),
                sender,
            });
        }

        server.handle_message(ServerMessage::Disconnect { id: 1 });
        server.run_tick();
        server.run_tick();

        let first = r2.try_recv().unwrap();
        let gone = tanks_in(&first).into_iter().find(|t| t.id == 1).unwrap();
        assert!(gone.dc && gone.died);
        assert_eq!(gone.hp, 0);

        let second = r2.try_recv().unwrap();
        assert!(tanks_in(&second).iter().all(|t| t.id != 1));
        assert!(server.world.tank(1).is_none());
    }

    #[tokio::test]
    async fn test_read_commands_reassembles_split_frames() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"moving\":\"up\",\"fire\":\"main\",")
            .read(b"\"tdir\":{\"x\":1.0,\"y\":0.0}}\nnot a command\n")
            .read(b"{\"moving\":\"left\",\"fire\":\"none\",\"tdir\":{\"x\":0.0,\"y\":1.0}}\n")
            .build();
        let (tx, mut rx) = mpsc::unbounded_channel();

        read_commands(reader, LineFramer::new(), 7, &tx).await;

        let mut commands = Vec::new();
        while let Ok(message) = rx.try_recv() {
            match message {
                ServerMessage::Command { id, command } => {
                    assert_eq!(id, 7);
                    commands.push(command);
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].moving, MoveDirection::Up);
        assert_eq!(commands[0].fire, FireMode::Main);
        assert_eq!(commands[1].moving, MoveDirection::Left);
        assert_eq!(commands[1].tdir, Vector2D::DOWN);
    }

    #[tokio::test]
    async fn test_write_snapshots_in_order() {
        let writer = tokio_test::io::Builder::new()
            .write(b"{\"power\":1}\n")
            .write(b"{\"power\":2}\n")
            .build();
        let (tx, rx) = mpsc::channel(4);
        tx.send(Arc::from("{\"power\":1}\n")).await.unwrap();
        tx.send(Arc::from("{\"power\":2}\n")).await.unwrap();
        drop(tx);

        write_snapshots(writer, rx, 1).await;
    }

    #[tokio::test]
    async fn test_closed_writer_counts_as_disconnect() {
        let mut server = test_server().await;
        let (sender, receiver) = mpsc::channel(4);
        server.handle_message(ServerMessage::Join {
            id: 3,
            name: "gone".to_string(),
            addr: test_addr(),
            sender,
        });
        drop(receiver);

        server.run_tick();
        assert!(server.clients.is_empty());
        assert!(server.world.tank(3).unwrap().disconnected);

        server.run_tick();
        assert!(server.world.tank(3).is_none());
    }
}
