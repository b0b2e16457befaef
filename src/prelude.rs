pub(crate) use {
    std::{
        collections::{
            BTreeMap,
            BTreeSet,
            HashMap,
            hash_map,
        },
        convert::identity,
        fmt,
        io,
        path::{
            Path,
            PathBuf,
        },
        sync::{
            Arc,
            atomic::{
                AtomicUsize,
                Ordering,
            },
        },
        time::Duration,
    },
    chrono::{
        DateTime,
        TimeDelta,
        Utc,
    },
    graphql_client::{
        GraphQLQuery,
        QueryBody,
    },
    itertools::Itertools as _,
    serde::{
        Deserialize,
        Serialize,
    },
    serde_json::Value,
    tokio::{
        sync::{
            Mutex,
            RwLock,
            mpsc,
        },
        time::{
            Instant,
            sleep,
            sleep_until,
        },
    },
    crate::{
        config::Config,
        model::{
            Competitor,
            TournamentRef,
        },
        scheduler::{
            RequestClass,
            RequestScheduler,
            ResultStore,
        },
        startgg::{
            ID,
            executor::RequestExecutor,
        },
    },
};
