//! Example binary wiring a `Settings`, a `RouterBuilder`-built `Router`, and
//! the reference mio runtime together.

use std::sync::Arc;

use log::info;

use relay_http::{Connection, HttpAction, RouterBuilder, Server, Settings};

struct Index;

impl HttpAction for Index {
    fn get(&self, conn: &mut Connection) {
        conn.write(b"<h1>relay-http</h1>");
        conn.flush();
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let settings = Arc::new(Settings::default());
    let router = RouterBuilder::new()
        .route("/", Box::new(Index))
        .expect("default route always compiles")
        .build();

    let mut server = Server::bind(settings.clone(), Arc::new(router))?;
    info!("listening on {}", settings.bind_addr);
    server.run()
}
