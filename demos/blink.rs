use std::time::Duration;

use bevy::log::{info, LogPlugin};
use bevy::prelude::*;
use coframe::prelude::*;

#[derive(Debug, Default, Clone, Copy)]
enum Light {
    #[default]
    Off,
    On,
}

fn main() {
    let mut app = App::new();
    app.add_plugins((LogPlugin::default(), CoroutinePlugin::<Light>::default()))
        .add_systems(Startup, setup_lights);

    for _ in 0..60 {
        app.update();
        std::thread::sleep(Duration::from_millis(16));
    }
}

fn setup_lights(controller: Res<CoroutineController<Light>>) {
    let lights = CoroutineContext::from_factory(|| {
        generator(|mut y: Yielder<Light>| async move {
            for i in 0..3 {
                info!("Blink {}", i);
                y.yield_(Light::On).await;
                y.wait_on(TimeBlockRequest::new(Duration::from_millis(150)))
                    .await;
                y.yield_(Light::Off).await;
                y.wait_on(UpdateCountBlockRequest::new(5)).await;
            }
        })
    });

    lights.stepped().subscribe(|stepped| {
        if stepped.finished {
            info!("Blinking done, the light is {:?}", stepped.value);
        }
    });

    controller.add_context(lights);
}
