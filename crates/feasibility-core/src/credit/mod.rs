pub mod covenants;
