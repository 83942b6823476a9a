//! Parser for NextBus `publicXMLFeed?command=predictions` documents.
//!
//! ```xml
//! <body copyright="...">
//!   <predictions agencyTitle="Toronto Transit Commission" routeTitle="504-King"
//!                stopTitle="King St West At Spadina Ave" stopTag="6604">
//!     <direction title="East - 504a King towards Broadview Station">
//!       <prediction epochTime="1700000420000" seconds="412" minutes="6" vehicle="4410"/>
//!     </direction>
//!     <message text="..." priority="Normal"/>
//!   </predictions>
//! </body>
//! ```

use serde::Deserialize;

use crate::error::ParseError;

use super::CountdownPrediction;

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(rename = "predictions", default)]
    predictions: Vec<PredictionsElement>,
    #[serde(rename = "Error", default)]
    errors: Vec<ErrorElement>,
}

#[derive(Debug, Deserialize)]
struct ErrorElement {
    #[serde(rename = "$value", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct PredictionsElement {
    #[serde(rename = "stopTitle")]
    stop_title: Option<String>,
    #[serde(rename = "routeTitle")]
    route_title: Option<String>,
    #[serde(rename = "routeTag")]
    route_tag: Option<String>,
    #[serde(rename = "direction", default)]
    directions: Vec<DirectionElement>,
}

#[derive(Debug, Deserialize)]
struct DirectionElement {
    #[serde(rename = "prediction", default)]
    predictions: Vec<PredictionElement>,
}

#[derive(Debug, Deserialize)]
struct PredictionElement {
    minutes: Option<String>,
    #[serde(rename = "epochTime")]
    epoch_time: Option<String>,
}

/// Decodes every `prediction` in the document, in document order.
///
/// Predictions without an `epochTime` are skipped.
///
/// # Errors
///
/// Returns [`ParseError::Xml`] for malformed XML, [`ParseError::InvalidField`]
/// for non-numeric `minutes`/`epochTime`, and [`ParseError::Upstream`] when the
/// document is a NextBus `<Error>` response.
pub fn parse_predictions(bytes: &[u8]) -> Result<Vec<CountdownPrediction>, ParseError> {
    let body: Body = serde_xml_rs::from_reader(bytes)?;

    if let Some(error) = body.errors.first() {
        return Err(ParseError::Upstream(error.message.trim().to_string()));
    }

    let mut out = Vec::new();
    for element in body.predictions {
        let route_title = element
            .route_title
            .or(element.route_tag)
            .unwrap_or_else(|| "Unknown".to_string());

        for prediction in element.directions.into_iter().flat_map(|d| d.predictions) {
            let Some(epoch_time) = prediction.epoch_time else {
                continue;
            };
            out.push(CountdownPrediction {
                stop_title: element.stop_title.clone(),
                route_title: route_title.clone(),
                minutes: prediction
                    .minutes
                    .map(|m| parse_attr("minutes", &m))
                    .transpose()?,
                epoch_time_millis: parse_attr("epochTime", &epoch_time)?,
            });
        }
    }

    Ok(out)
}

fn parse_attr(field: &'static str, value: &str) -> Result<i64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}
