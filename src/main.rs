use std::sync::Arc;

use aether_core::{Config, ThemeProvider, ThemeStore};
use aether_dashboard::{recv_event, CityFilter, Dashboard, DashboardEvent, RefreshSummary};
use aether_weather::{pollutant_label, round_temperature, CityWeatherRecord, DETAIL_POLLUTANTS};
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: add <city> | remove <city> | tab <city> | all | close | refresh | theme | quit";

#[tokio::main]
async fn main() -> Result<()> {
    aether_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    let theme = Arc::new(ThemeProvider::load(
        ThemeStore::new(config.preferences_path()),
        None,
    ));

    let probe = aether_weather::WeatherClient::new(&config.api.base_url, config.api.request_timeout())?;
    match probe.health_check().await {
        Ok(true) => tracing::info!("Weather proxy is up"),
        _ => tracing::warn!("Weather proxy at {} is not responding", config.api.base_url),
    }

    let dashboard = Arc::new(Dashboard::connect(&config, theme)?);
    tracing::info!("Aether started with {:?}", dashboard.cities());

    let mut events = dashboard.subscribe();
    let renderer = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move {
            while let Some(event) = recv_event(&mut events).await {
                match event {
                    DashboardEvent::RefreshFinished(RefreshSummary::Superseded { .. }) => {}
                    DashboardEvent::RefreshFinished(_) => render(&dashboard),
                    DashboardEvent::ErrorPosted(message) => println!("! {}", message),
                    DashboardEvent::ThemeChanged(theme) => println!("Theme: {}", theme),
                    DashboardEvent::CityAdded(city) => println!("+ {}", city),
                    DashboardEvent::CityRemoved(city) => println!("- {}", city),
                }
            }
        })
    };

    dashboard.start();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_command(&dashboard, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    dashboard.shutdown();
    renderer.abort();
    tracing::info!("Aether stopped");
    Ok(())
}

/// Run one command line; false means quit.
async fn handle_command(dashboard: &Dashboard, line: &str) -> bool {
    let (command, arg) = line
        .split_once(' ')
        .map_or((line, ""), |(c, a)| (c, a.trim()));

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "add" => {
            // Failures are reported through ErrorPosted
            let _ = dashboard.add_city(arg).await;
        }
        "remove" => {
            let _ = dashboard.remove_city(arg);
        }
        "tab" => {
            dashboard.activate_city_tab(arg);
            render(dashboard);
        }
        "all" => {
            dashboard.select_filter(CityFilter::All);
            render(dashboard);
        }
        "close" => {
            dashboard.close_detail();
            render(dashboard);
        }
        "refresh" => {
            dashboard.refresh_now().await;
        }
        "theme" => {
            if let Err(e) = dashboard.toggle_theme() {
                tracing::error!("Failed to save theme: {}", e);
            }
        }
        _ => println!("{}", HELP),
    }
    true
}

fn render(dashboard: &Dashboard) {
    let snapshot = dashboard.snapshot();
    let view = dashboard.view();

    println!();
    if let Some(error) = &snapshot.last_error {
        println!("! {}", error);
    }
    if snapshot.is_loading && snapshot.records.is_empty() {
        println!("Loading...");
        return;
    }

    if let Some(detail) = view.detail() {
        render_detail(detail);
        return;
    }

    for record in dashboard.visible_records() {
        println!("{}", summary_line(record));
    }
}

fn summary_line(record: CityWeatherRecord) -> String {
    let weather = &record.weather;
    let condition = weather
        .primary_condition()
        .map(|c| c.description.as_str())
        .unwrap_or("-");
    let aqi = record
        .current_aqi()
        .map(|r| r.level().label())
        .unwrap_or("N/A");

    format!(
        "{:<16} {:>4}°C  {:<18} AQI {:<15} {}",
        weather.name,
        round_temperature(weather.main.temp),
        condition,
        aqi,
        weather.local_time(),
    )
}

fn render_detail(record: &CityWeatherRecord) {
    let weather = &record.weather;
    println!("== {} ({}) ==", weather.name, weather.local_time());
    println!(
        "Temperature {}°C, feels like {}°C (min {}°C, max {}°C)",
        round_temperature(weather.main.temp),
        round_temperature(weather.main.feels_like),
        round_temperature(weather.main.temp_min),
        round_temperature(weather.main.temp_max),
    );
    println!(
        "Humidity {}%, pressure {} hPa, wind {}",
        weather.main.humidity,
        weather.main.pressure,
        weather
            .wind_speed()
            .map_or_else(|| "N/A".to_string(), |s| format!("{} m/s", s)),
    );

    match record.current_aqi() {
        Some(reading) => {
            println!("Air quality: {}", reading.level().label());
            for key in DETAIL_POLLUTANTS {
                let value = reading
                    .pollutant(key)
                    .map_or_else(|| "N/A".to_string(), |v| format!("{:.1} μg/m³", v));
                println!("  {:<6} {}", pollutant_label(key), value);
            }
        }
        None => println!("Air quality: N/A"),
    }
}
