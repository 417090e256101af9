//! Topics del canal de mensajería.

/// Un topic por etapa del pipeline, más el de entrada del dispatcher al que
/// todas las etapas publican sus eventos de finalización.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Dispatcher,
    TextPreprocessing,
    TextEncoding,
    TextSummarization,
    TextPostprocessing,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Dispatcher => "dispatcher-topic",
            Topic::TextPreprocessing => "text-preprocessing-topic",
            Topic::TextEncoding => "text-encoding-topic",
            Topic::TextSummarization => "text-summarization-topic",
            Topic::TextPostprocessing => "text-postprocessing-topic",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
